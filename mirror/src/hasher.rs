//! Hashing writes and atomic file placement.
//!
//! Every disk write of downloaded content goes through [`PartWriter`]: the
//! body streams into a sibling `.part` file while a SHA256 runs over it,
//! and only a verified, complete file is renamed to the canonical path.
//! Partial files therefore never exist at canonical paths.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Streaming SHA256 writer with atomic placement.
pub struct PartWriter {
    file: fs::File,
    part_path: PathBuf,
    final_path: PathBuf,
    hasher: Sha256,
    written: u64,
    keep_part: bool,
}

/// Outcome of a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Lowercase hex SHA256 of the content.
    pub sha256: String,
    /// Number of bytes written.
    pub size: u64,
}

impl PartWriter {
    /// Open `{final_path}.part` for writing, creating parent directories.
    /// With `keep_part`, an abort or verification failure leaves the
    /// partial file behind for inspection.
    pub async fn create(final_path: &Path, keep_part: bool) -> std::io::Result<Self> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut part_path = final_path.as_os_str().to_owned();
        part_path.push(".part");
        let part_path = PathBuf::from(part_path);
        let file = fs::File::create(&part_path).await?;
        Ok(Self {
            file,
            part_path,
            final_path: final_path.to_path_buf(),
            hasher: Sha256::new(),
            written: 0,
            keep_part,
        })
    }

    /// Append a chunk of the body.
    pub async fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.hasher.update(chunk);
        self.written += chunk.len() as u64;
        self.file.write_all(chunk).await
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, verify against the expectations, and rename into place.
    /// On mismatch the `.part` file is removed (unless retention was
    /// requested) and `Err` carries what was actually observed.
    pub async fn commit(
        mut self,
        expected_sha256: Option<&str>,
        expected_size: Option<u64>,
    ) -> std::io::Result<Result<WrittenFile, WrittenFile>> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        let written = WrittenFile {
            sha256: hex::encode(self.hasher.finalize()),
            size: self.written,
        };

        let hash_ok = expected_sha256.map_or(true, |e| e.eq_ignore_ascii_case(&written.sha256));
        let size_ok = expected_size.map_or(true, |e| e == written.size);
        if !hash_ok || !size_ok {
            if self.keep_part {
                warn!(path = %self.part_path.display(), "keeping mismatched .part file");
            } else {
                fs::remove_file(&self.part_path).await?;
            }
            return Ok(Err(written));
        }

        fs::rename(&self.part_path, &self.final_path).await?;
        Ok(Ok(written))
    }

    /// Drop the partial file (download aborted or failed mid-stream).
    pub async fn abort(self) {
        drop(self.file);
        if self.keep_part {
            warn!(path = %self.part_path.display(), "keeping aborted .part file");
        } else if let Err(e) = fs::remove_file(&self.part_path).await {
            warn!(path = %self.part_path.display(), error = %e, "failed to remove .part file");
        }
    }
}

/// SHA256 and size of an existing file, streaming off the blocking pool.
pub async fn sha256_file(path: &Path) -> std::io::Result<WrittenFile> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        use std::io::Read;
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 64 * 1024];
        let mut size = 0u64;
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            size += n as u64;
        }
        Ok(WrittenFile {
            sha256: hex::encode(hasher.finalize()),
            size,
        })
    })
    .await
    .expect("hashing task panicked")
}
