//! Row types shared between the writer and the query layer.

use serde::Serialize;

/// The ingestion unit: one (archive, timestamp, suite, component, arch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleKey {
    /// Archive name.
    pub archive: String,
    /// Snapshot timestamp, canonical form.
    pub timestamp: String,
    /// Suite name.
    pub suite: String,
    /// Component name.
    pub component: String,
    /// Architecture, or `source` for source indexes.
    pub architecture: String,
}

impl std::fmt::Display for TupleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.archive, self.timestamp, self.suite, self.component, self.architecture
        )
    }
}

/// A file identity as carried by an index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Lowercase hex SHA256.
    pub sha256: String,
    /// Size in bytes.
    pub size: u64,
}

/// One file to record for a package, with its logical location.
#[derive(Debug, Clone)]
pub struct PackageFileRecord {
    /// File identity.
    pub file: FileRef,
    /// Pool-relative directory of the file.
    pub path: String,
    /// File name.
    pub name: String,
    /// Architecture for binary packages, `None` for source files.
    pub architecture: Option<String>,
}

/// A closed interval of archive timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampRange {
    /// First timestamp of the interval.
    pub begin: String,
    /// Last timestamp of the interval.
    pub end: String,
}

/// Everything the API reports about one location of a file.
#[derive(Debug, Clone, Serialize)]
pub struct FileLocation {
    /// File name at this location.
    pub name: String,
    /// Pool-relative directory.
    pub path: String,
    /// File size in bytes.
    pub size: i64,
    /// Archive the location belongs to.
    pub archive_name: String,
    /// Suite the location belongs to.
    pub suite_name: String,
    /// Component the location belongs to.
    pub component_name: String,
    /// Coalesced presence intervals, chronological.
    pub timestamp_ranges: Vec<(String, String)>,
    /// Earliest observed timestamp.
    pub first_seen: String,
    /// Latest observed timestamp.
    pub last_seen: String,
}

/// One observed placement of a binary package version, used by the
/// buildinfo solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryObservation {
    /// Architecture recorded for the file (`all` or a concrete arch).
    pub architecture: String,
    /// Archive of the location.
    pub archive_name: String,
    /// Suite of the location.
    pub suite_name: String,
    /// Component of the location.
    pub component_name: String,
    /// Coalesced presence intervals at this location.
    pub ranges: Vec<TimestampRange>,
}
