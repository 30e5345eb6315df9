//! Typed view of `Sources` index paragraphs.

use crate::error::Result;
use crate::paragraph::Paragraph;
use crate::release::parse_checksum_line;

/// One file of a source package, from the `Checksums-Sha256` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileEntry {
    /// Lowercase hex SHA256.
    pub sha256: String,
    /// Size in bytes.
    pub size: u64,
    /// File name within the package directory.
    pub name: String,
}

/// One source package entry of a `Sources` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
    /// Source package name.
    pub name: String,
    /// Source package version.
    pub version: String,
    /// Pool directory holding the files, archive-root relative.
    pub directory: String,
    /// Files making up the source package.
    pub files: Vec<SourceFileEntry>,
}

impl SourcePackage {
    /// Extract the typed record from a `Sources` paragraph.
    pub fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let mut files = Vec::new();
        for line in paragraph.block_lines("Checksums-Sha256") {
            let entry = parse_checksum_line(line)?;
            files.push(SourceFileEntry {
                sha256: entry.sha256,
                size: entry.size,
                name: entry.path,
            });
        }

        Ok(Self {
            name: paragraph.required("Package")?.to_string(),
            version: paragraph.required("Version")?.to_string(),
            directory: paragraph.required("Directory")?.to_string(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paragraph::ParagraphReader;

    const SOURCES: &str = "\
Package: hello
Binary: hello
Version: 2.10-2
Maintainer: Santiago Vila <sanvila@debian.org>
Directory: pool/main/h/hello
Checksums-Sha256:
 aa11223344556677889900aabbccddeeff00112233445566778899aabbccddee 1093 hello_2.10-2.dsc
 bb11223344556677889900aabbccddeeff00112233445566778899aabbccddee 725946 hello_2.10.orig.tar.gz
 cc11223344556677889900aabbccddeeff00112233445566778899aabbccddee 6132 hello_2.10-2.debian.tar.xz
";

    #[test]
    fn test_parse_sources() {
        let paragraph = ParagraphReader::new(SOURCES.as_bytes())
            .next()
            .unwrap()
            .unwrap();
        let src = SourcePackage::from_paragraph(&paragraph).unwrap();
        assert_eq!(src.name, "hello");
        assert_eq!(src.version, "2.10-2");
        assert_eq!(src.directory, "pool/main/h/hello");
        assert_eq!(src.files.len(), 3);
        assert_eq!(src.files[0].name, "hello_2.10-2.dsc");
        assert_eq!(src.files[1].size, 725946);
    }

    #[test]
    fn test_missing_directory() {
        let paragraph = ParagraphReader::new("Package: x\nVersion: 1\n".as_bytes())
            .next()
            .unwrap()
            .unwrap();
        assert!(SourcePackage::from_paragraph(&paragraph).is_err());
    }
}
