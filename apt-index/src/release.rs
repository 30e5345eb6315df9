//! Typed view of a repository `Release` file.

use std::io::Read;

use crate::error::{IndexError, Result};
use crate::paragraph::{Paragraph, ParagraphReader};

/// One entry of the `SHA256` block: an index file advertised by the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFileEntry {
    /// Lowercase hex SHA256 of the file.
    pub sha256: String,
    /// Size of the file in bytes.
    pub size: u64,
    /// Path relative to the `Release` file's directory.
    pub path: String,
}

/// The subset of a `Release` file the ingester needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Suite name (e.g. `unstable`).
    pub suite: Option<String>,
    /// Codename (e.g. `sid`).
    pub codename: Option<String>,
    /// Components advertised by the release.
    pub components: Vec<String>,
    /// Architectures advertised by the release.
    pub architectures: Vec<String>,
    /// Advertised index files with their SHA256 and size.
    pub files: Vec<ReleaseFileEntry>,
}

impl Release {
    /// Parse a `Release` (or the signed payload of an `InRelease`) stream.
    ///
    /// Only the first paragraph is considered; a missing or empty one is an
    /// error since nothing can be ingested without it.
    pub fn parse<R: Read>(input: R) -> Result<Self> {
        let mut reader = ParagraphReader::new(input);
        let paragraph = reader
            .next()
            .transpose()?
            .ok_or_else(|| IndexError::missing_field("Release"))?;
        Self::from_paragraph(&paragraph)
    }

    /// Build the view from an already-parsed paragraph.
    pub fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let mut files = Vec::new();
        for line in paragraph.block_lines("SHA256") {
            files.push(parse_checksum_line(line)?);
        }

        Ok(Self {
            suite: paragraph.get("Suite").map(str::to_string),
            codename: paragraph.get("Codename").map(str::to_string),
            components: split_list(paragraph.get("Components")),
            architectures: split_list(paragraph.get("Architectures")),
            files,
        })
    }

    /// Look up the advertised entry for a relative path.
    pub fn file(&self, path: &str) -> Option<&ReleaseFileEntry> {
        self.files.iter().find(|f| f.path == path)
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Parse one `sha256 size path` checksum line.
pub(crate) fn parse_checksum_line(line: &str) -> Result<ReleaseFileEntry> {
    let mut parts = line.split_whitespace();
    let (sha256, size, path) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(s), Some(p), None) => (h, s, p),
        _ => return Err(IndexError::invalid_field("SHA256", line)),
    };
    let size = size
        .parse::<u64>()
        .map_err(|_| IndexError::invalid_field("SHA256", line))?;
    Ok(ReleaseFileEntry {
        sha256: sha256.to_lowercase(),
        size,
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE: &str = "\
Origin: Debian
Suite: bullseye
Codename: bullseye
Components: main contrib non-free
Architectures: all amd64 arm64
Date: Sun, 21 Feb 2021 15:00:11 UTC
SHA256:
 aa11223344556677889900aabbccddeeff00112233445566778899aabbccddee 1234 main/binary-all/Packages.xz
 bb11223344556677889900aabbccddeeff00112233445566778899aabbccddee 999 main/source/Sources.xz
";

    #[test]
    fn test_parse_release() {
        let release = Release::parse(RELEASE.as_bytes()).unwrap();
        assert_eq!(release.suite.as_deref(), Some("bullseye"));
        assert_eq!(release.codename.as_deref(), Some("bullseye"));
        assert_eq!(release.components, vec!["main", "contrib", "non-free"]);
        assert_eq!(release.architectures, vec!["all", "amd64", "arm64"]);
        assert_eq!(release.files.len(), 2);

        let entry = release.file("main/binary-all/Packages.xz").unwrap();
        assert_eq!(entry.size, 1234);
        assert!(entry.sha256.starts_with("aa1122"));
        assert!(release.file("main/binary-all/Packages.gz").is_none());
    }

    #[test]
    fn test_empty_input_is_fatal() {
        assert!(Release::parse(&b""[..]).is_err());
    }

    #[test]
    fn test_checksum_line_errors() {
        assert!(parse_checksum_line("too few").is_err());
        assert!(parse_checksum_line("hash notanumber path").is_err());
        assert!(parse_checksum_line("hash 12 path extra").is_err());
    }

    #[test]
    fn test_hash_normalized_to_lowercase() {
        let entry = parse_checksum_line("AABB 10 dists/x").unwrap();
        assert_eq!(entry.sha256, "aabb");
    }
}
