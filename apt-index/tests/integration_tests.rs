use std::io::Write;

use apt_index::*;

const RELEASE: &str = "\
Origin: Debian
Label: Debian
Suite: bullseye
Codename: bullseye
Date: Sun, 21 Feb 2021 15:00:11 UTC
Architectures: all amd64
Components: main contrib
SHA256:
 1111111111111111111111111111111111111111111111111111111111111111 321 main/binary-all/Packages.xz
 2222222222222222222222222222222222222222222222222222222222222222 654 main/binary-amd64/Packages.xz
 3333333333333333333333333333333333333333333333333333333333333333 987 main/source/Sources.xz
";

const PACKAGES: &str = "\
Package: hello
Version: 2.10-2
Architecture: all
Maintainer: Santiago Vila <sanvila@debian.org>
Installed-Size: 280
Depends: libc6 (>= 2.14)
Description: example package based on GNU hello
 The GNU hello program produces a familiar, friendly greeting.
Filename: pool/main/h/hello/hello_2.10-2_all.deb
Size: 12345
SHA256: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa

Package: base-files
Version: 11
Architecture: amd64
Filename: pool/main/b/base-files/base-files_11_amd64.deb
Size: 70592
SHA256: bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb
";

const SOURCES: &str = "\
Package: hello
Binary: hello
Version: 2.10-2
Directory: pool/main/h/hello
Checksums-Sha256:
 cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc 1093 hello_2.10-2.dsc
 dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd 725946 hello_2.10.orig.tar.gz
";

#[test]
fn test_release_to_index_selection() {
    let release = Release::parse(RELEASE.as_bytes()).unwrap();
    assert_eq!(release.suite.as_deref(), Some("bullseye"));
    assert_eq!(release.components, vec!["main", "contrib"]);
    assert_eq!(release.architectures, vec!["all", "amd64"]);

    // an ingester looks up the advertised index entry before fetching it
    let entry = release.file("main/binary-all/Packages.xz").unwrap();
    assert_eq!(entry.size, 321);
    assert!(release.file("contrib/binary-all/Packages.xz").is_none());
}

#[test]
fn test_packages_stream_through_gzip() {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(PACKAGES.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let decompressed = Compression::from_name("Packages.gz")
        .unwrap()
        .decompress(&compressed)
        .unwrap();

    let packages: Vec<BinaryPackage> = ParagraphReader::new(decompressed.as_slice())
        .map(|p| BinaryPackage::from_paragraph(&p.unwrap()).unwrap())
        .collect();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0].name, "hello");
    assert_eq!(packages[0].architecture, "all");
    assert_eq!(packages[0].size, 12345);
    assert_eq!(packages[1].name, "base-files");
    assert_eq!(packages[1].pool_directory(), "pool/main/b/base-files");
}

#[test]
fn test_sources_stream() {
    let sources: Vec<SourcePackage> = ParagraphReader::new(SOURCES.as_bytes())
        .map(|p| SourcePackage::from_paragraph(&p.unwrap()).unwrap())
        .collect();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].files.len(), 2);
    assert_eq!(sources[0].files[1].size, 725946);
}

#[test]
fn test_buildinfo_end_to_end() {
    let buildinfo = "\
Format: 1.0
Source: hello
Architecture: amd64
Version: 2.10-2
Build-Architecture: amd64
Installed-Build-Depends:
 base-files (= 11),
 hello:all (= 2.10-2)
";
    let info = Buildinfo::parse(buildinfo.as_bytes()).unwrap();
    assert_eq!(info.source, "hello");
    let arches: Vec<String> = info
        .installed_build_depends
        .iter()
        .map(|d| d.effective_architecture(&info.build_architecture))
        .collect();
    assert_eq!(arches, vec!["amd64", "all"]);
}
