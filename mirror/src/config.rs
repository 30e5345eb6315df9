//! Ingester configuration.
//!
//! One explicit value threaded through the pipeline; nothing lives in
//! process globals. CLI arguments win over environment variables.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{MirrorError, MirrorResult};

/// Default upstream snapshot service.
pub const DEFAULT_UPSTREAM: &str = "http://snapshot.notset.fr";

/// Behavior switches of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestFlags {
    /// Re-hash on-disk files against the store, download nothing.
    pub check_only: bool,
    /// Record provenance in the database after downloading.
    pub provision_db: bool,
    /// Skip downloads, re-parse on-disk indexes and (re)provision the database.
    pub provision_db_only: bool,
    /// Re-provision tuples already marked as provisioned.
    pub ignore_provisioned: bool,
    /// Do not ingest `installer-{arch}` image files.
    pub skip_installer_files: bool,
    /// Keep `.part` files of aborted downloads for inspection.
    pub no_clean_part_file: bool,
}

impl IngestFlags {
    /// Whether this run writes provenance to the database.
    pub fn writes_db(&self) -> bool {
        self.provision_db || self.provision_db_only
    }

    /// Whether this run downloads payload files.
    pub fn downloads(&self) -> bool {
        !self.check_only && !self.provision_db_only
    }
}

/// Everything the pipeline needs to run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local replica root.
    pub root: PathBuf,
    /// Upstream snapshot service root URL.
    pub upstream: Url,
    /// Database connection string.
    pub database_url: Option<String>,
    /// Width of the download worker pool.
    pub download_workers: usize,
    /// Per-request deadline.
    pub request_timeout: Duration,
    /// Optional byte-rate cap for payload downloads, bytes per second.
    pub rate_cap: Option<u64>,
    /// Behavior switches.
    pub flags: IngestFlags,
}

impl Config {
    /// Assemble the configuration from CLI values and the environment.
    /// `SNAPSHOT_ROOT`, `SNAPSHOT_UPSTREAM` and `SNAPSHOT_DB_URL` fill in
    /// whatever the command line left unset.
    pub fn new(
        local_directory: Option<PathBuf>,
        upstream: Option<String>,
        database_url: Option<String>,
        flags: IngestFlags,
    ) -> MirrorResult<Self> {
        let root = local_directory
            .or_else(|| std::env::var("SNAPSHOT_ROOT").ok().map(PathBuf::from))
            .ok_or_else(|| {
                MirrorError::InvalidArgument(
                    "no local directory given and SNAPSHOT_ROOT unset".to_string(),
                )
            })?;
        let upstream = upstream
            .or_else(|| std::env::var("SNAPSHOT_UPSTREAM").ok())
            .unwrap_or_else(|| DEFAULT_UPSTREAM.to_string());
        let upstream = Url::parse(&upstream)
            .map_err(|e| MirrorError::InvalidArgument(format!("invalid upstream URL: {e}")))?;
        let database_url = database_url.or_else(|| std::env::var("SNAPSHOT_DB_URL").ok());

        if flags.writes_db() && database_url.is_none() {
            return Err(MirrorError::InvalidArgument(
                "database provisioning requested but SNAPSHOT_DB_URL unset".to_string(),
            ));
        }

        Ok(Self {
            root,
            upstream,
            database_url,
            download_workers: 10,
            request_timeout: Duration::from_secs(600),
            rate_cap: None,
            flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_combinations() {
        let mirror_only = IngestFlags::default();
        assert!(mirror_only.downloads());
        assert!(!mirror_only.writes_db());

        let both = IngestFlags {
            provision_db: true,
            ..Default::default()
        };
        assert!(both.downloads());
        assert!(both.writes_db());

        let db_only = IngestFlags {
            provision_db_only: true,
            ..Default::default()
        };
        assert!(!db_only.downloads());
        assert!(db_only.writes_db());

        let check = IngestFlags {
            check_only: true,
            ..Default::default()
        };
        assert!(!check.downloads());
        assert!(!check.writes_db());
    }

    #[test]
    fn test_missing_root_is_an_argument_error() {
        std::env::remove_var("SNAPSHOT_ROOT");
        let err = Config::new(None, None, None, IngestFlags::default()).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidArgument(_)));
    }
}
