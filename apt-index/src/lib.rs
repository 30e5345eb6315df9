//! # APT Index Library
//!
//! Parsing of the index files that make up an APT repository snapshot:
//! `Release`, `Packages`, `Sources` and `.buildinfo` control files. All of
//! them share the RFC822-style paragraph format; this library provides a
//! streaming paragraph reader plus typed views for each index kind, with
//! transparent decompression of `.gz`, `.xz` and `.bz2` inputs.
//!
//! ## Example
//!
//! ```rust
//! use apt_index::{BinaryPackage, ParagraphReader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = "Package: hello\nVersion: 2.10-2\nArchitecture: all\n\
//!             Filename: pool/main/h/hello/hello_2.10-2_all.deb\n\
//!             Size: 12345\nSHA256: 0000000000000000000000000000000000000000000000000000000000000000\n";
//! for paragraph in ParagraphReader::new(data.as_bytes()) {
//!     let pkg = BinaryPackage::from_paragraph(&paragraph?)?;
//!     assert_eq!(pkg.name, "hello");
//! }
//! # Ok(())
//! # }
//! ```

pub mod buildinfo;
pub mod compression;
pub mod error;
pub mod packages;
pub mod paragraph;
pub mod release;
pub mod sources;

pub use buildinfo::{BuildDependency, Buildinfo};
pub use compression::Compression;
pub use error::{IndexError, Result};
pub use packages::BinaryPackage;
pub use paragraph::{Paragraph, ParagraphReader};
pub use release::{Release, ReleaseFileEntry};
pub use sources::{SourceFileEntry, SourcePackage};
