//! Per-archive advisory write lock.
//!
//! Held across an (archive, timestamp) ingestion so concurrent cron runs
//! never write the same archive. The lock is an OS-level advisory file
//! lock; a held lock makes the process exit without touching state.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;
use tracing::debug;

use crate::error::{MirrorError, MirrorResult};

/// An exclusive hold on one archive. Released on drop.
pub struct ArchiveLock {
    file: File,
    archive: String,
}

impl ArchiveLock {
    /// Try to take the archive lock at `path`, creating the lock file and
    /// its directory if needed. Fails with `LockHeld` when another process
    /// owns it.
    pub fn acquire(path: &Path, archive: &str) -> MirrorResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| MirrorError::LockHeld(archive.to_string()))?;
        debug!(archive, path = %path.display(), "acquired archive lock");
        Ok(Self {
            file,
            archive: archive.to_string(),
        })
    }
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(archive = %self.archive, "released archive lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exclusive_within_process() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".locks").join("debian.lock");

        let held = ArchiveLock::acquire(&path, "debian").unwrap();
        let second = ArchiveLock::acquire(&path, "debian");
        assert!(matches!(second, Err(MirrorError::LockHeld(_))));

        drop(held);
        assert!(ArchiveLock::acquire(&path, "debian").is_ok());
    }

    #[test]
    fn test_distinct_archives_do_not_contend() {
        let dir = TempDir::new().unwrap();
        let a = ArchiveLock::acquire(&dir.path().join("a.lock"), "a").unwrap();
        let b = ArchiveLock::acquire(&dir.path().join("b.lock"), "b").unwrap();
        drop((a, b));
    }
}
