//! Transparent decompression of index files.

use std::io::Read;

use crate::error::{IndexError, Result};

/// Compression formats seen on snapshot index files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Bzip2 compression.
    Bzip2,
    /// XZ compression.
    Xz,
}

impl Compression {
    /// Get the file extension for this compression format.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
            Compression::Xz => ".xz",
        }
    }

    /// Derive the compression format from a file name.
    pub fn from_name(name: &str) -> Result<Self> {
        if name.ends_with(".gz") {
            Ok(Compression::Gzip)
        } else if name.ends_with(".bz2") {
            Ok(Compression::Bzip2)
        } else if name.ends_with(".xz") {
            Ok(Compression::Xz)
        } else if name.ends_with(".lzma") || name.ends_with(".zst") {
            Err(IndexError::UnsupportedCompression(name.to_string()))
        } else {
            Ok(Compression::None)
        }
    }

    /// Wrap a reader with the matching decompressor.
    pub fn reader<R: Read + 'static>(self, reader: R) -> Box<dyn Read> {
        match self {
            Compression::None => Box::new(reader),
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        }
    }

    /// Decompress a complete buffer.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.clone_reader(data)?.read_to_end(&mut out)?;
        Ok(out)
    }

    fn clone_reader<'a>(&self, data: &'a [u8]) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(data),
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(data)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(data)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(data)),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Xz => write!(f, "xz"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_name() {
        assert_eq!(Compression::from_name("Packages").unwrap(), Compression::None);
        assert_eq!(Compression::from_name("Packages.gz").unwrap(), Compression::Gzip);
        assert_eq!(Compression::from_name("Packages.bz2").unwrap(), Compression::Bzip2);
        assert_eq!(Compression::from_name("Sources.xz").unwrap(), Compression::Xz);
        assert!(Compression::from_name("Packages.lzma").is_err());
    }

    #[test]
    fn test_gzip_roundtrip() {
        let data = b"Package: hello\nVersion: 2.10-2\n";
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = Compression::Gzip.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_xz_roundtrip() {
        let data = b"Package: hello\n";
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = Compression::Xz.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_bzip2_roundtrip() {
        let data = b"Package: hello\n";
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = Compression::Bzip2.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_none_passthrough() {
        let data = b"plain";
        assert_eq!(Compression::None.decompress(data).unwrap(), data);
    }
}
