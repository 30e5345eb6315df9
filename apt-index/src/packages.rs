//! Typed view of `Packages` index paragraphs.

use crate::error::Result;
use crate::paragraph::Paragraph;

/// One binary package entry of a `Packages` index.
///
/// Unknown fields are discarded at parse time; the ingester only tracks the
/// provenance tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPackage {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Architecture (`all` for arch-independent packages).
    pub architecture: String,
    /// Path of the `.deb` relative to the archive root.
    pub filename: String,
    /// Size of the `.deb` in bytes.
    pub size: u64,
    /// Lowercase hex SHA256 of the `.deb`.
    pub sha256: String,
}

impl BinaryPackage {
    /// Extract the typed record from a `Packages` paragraph.
    pub fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        Ok(Self {
            name: paragraph.required("Package")?.to_string(),
            version: paragraph.required("Version")?.to_string(),
            architecture: paragraph.required("Architecture")?.to_string(),
            filename: paragraph.required("Filename")?.to_string(),
            size: paragraph.required_u64("Size")?,
            sha256: paragraph.required("SHA256")?.to_lowercase(),
        })
    }

    /// Directory part of `filename`, pool-relative.
    pub fn pool_directory(&self) -> &str {
        self.filename
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    /// File name part of `filename`.
    pub fn file_name(&self) -> &str {
        self.filename
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paragraph::ParagraphReader;

    const PACKAGES: &str = "\
Package: hello
Version: 2.10-2
Architecture: all
Maintainer: Santiago Vila <sanvila@debian.org>
Depends: libc6 (>= 2.14)
Description: example package based on GNU hello
Filename: pool/main/h/hello/hello_2.10-2_all.deb
Size: 12345
MD5sum: 6fa0d03c3f1ecb0fc293d2b73e915417
SHA256: AA11223344556677889900aabbccddeeff00112233445566778899aabbccddee

Package: broken
Version: 1.0
";

    #[test]
    fn test_parse_packages() {
        let mut reader = ParagraphReader::new(PACKAGES.as_bytes());

        let first = reader.next().unwrap().unwrap();
        let pkg = BinaryPackage::from_paragraph(&first).unwrap();
        assert_eq!(pkg.name, "hello");
        assert_eq!(pkg.version, "2.10-2");
        assert_eq!(pkg.architecture, "all");
        assert_eq!(pkg.filename, "pool/main/h/hello/hello_2.10-2_all.deb");
        assert_eq!(pkg.size, 12345);
        assert!(pkg.sha256.starts_with("aa112233"));

        // second paragraph lacks Filename/Size/SHA256
        let second = reader.next().unwrap().unwrap();
        assert!(BinaryPackage::from_paragraph(&second).is_err());
    }

    #[test]
    fn test_pool_split() {
        let paragraph = ParagraphReader::new(
            "Package: hello\nVersion: 1\nArchitecture: all\n\
             Filename: pool/main/h/hello/hello_1_all.deb\nSize: 1\nSHA256: aa\n"
                .as_bytes(),
        )
        .next()
        .unwrap()
        .unwrap();
        let pkg = BinaryPackage::from_paragraph(&paragraph).unwrap();
        assert_eq!(pkg.pool_directory(), "pool/main/h/hello");
        assert_eq!(pkg.file_name(), "hello_1_all.deb");
    }
}
