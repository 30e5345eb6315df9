//! Write path: tuple-scoped provisioning transactions.
//!
//! All writes for one (archive, timestamp, suite, component, arch) happen
//! inside a single transaction so readers never see a partially provisioned
//! timestamp.

use sqlx::{Postgres, Row, Transaction};
use tracing::debug;

use crate::coalesce::{self, CoalescePlan};
use crate::error::{StoreError, StoreResult};
use crate::models::{PackageFileRecord, TimestampRange, TupleKey};
use crate::{is_valid_timestamp, Store};

impl Store {
    /// Whether the tuple was fully provisioned by an earlier run.
    pub async fn is_provisioned(&self, tuple: &TupleKey) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM provisioned
             WHERE archive_name = $1 AND timestamp_value = $2
               AND suite_name = $3 AND component_name = $4 AND architecture = $5",
        )
        .bind(&tuple.archive)
        .bind(&tuple.timestamp)
        .bind(&tuple.suite)
        .bind(&tuple.component)
        .bind(&tuple.architecture)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.is_some())
    }

    /// Open the provisioning transaction for one tuple. Upserts the
    /// immortal entities (archive, timestamp, suite, component, arch) up
    /// front; everything else is recorded through the returned handle.
    pub async fn begin_tuple(&self, tuple: TupleKey) -> StoreResult<ProvisioningTx<'_>> {
        if !is_valid_timestamp(&tuple.timestamp) {
            return Err(StoreError::InvalidTimestamp(tuple.timestamp.clone()));
        }
        let mut tx = self.pool().begin().await?;

        sqlx::query("INSERT INTO archives (name) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(&tuple.archive)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO timestamps (archive_name, value) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(&tuple.archive)
        .bind(&tuple.timestamp)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO suites (archive_name, name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(&tuple.archive)
        .bind(&tuple.suite)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO components (archive_name, suite_name, name) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(&tuple.archive)
        .bind(&tuple.suite)
        .bind(&tuple.component)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO architectures (name) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(&tuple.architecture)
            .execute(&mut *tx)
            .await?;

        Ok(ProvisioningTx { tx, tuple })
    }
}

/// Tuple-scoped write handle. Dropping it without `commit` rolls back.
pub struct ProvisioningTx<'a> {
    tx: Transaction<'a, Postgres>,
    tuple: TupleKey,
}

impl ProvisioningTx<'_> {
    /// The tuple this transaction provisions.
    pub fn tuple(&self) -> &TupleKey {
        &self.tuple
    }

    /// Record a source package and its files as observed at this tuple's
    /// timestamp.
    pub async fn record_source_package(
        &mut self,
        name: &str,
        version: &str,
        files: &[PackageFileRecord],
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO srcpkg (name, version) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(name)
            .bind(version)
            .execute(&mut *self.tx)
            .await?;

        for record in files {
            self.upsert_file(record).await?;
            sqlx::query(
                "INSERT INTO srcpkg_files (srcpkg_name, srcpkg_version, file_sha256)
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(name)
            .bind(version)
            .bind(&record.file.sha256)
            .execute(&mut *self.tx)
            .await?;
            self.record_observation(record).await?;
        }
        Ok(())
    }

    /// Record a binary package and its file as observed at this tuple's
    /// timestamp.
    pub async fn record_binary_package(
        &mut self,
        name: &str,
        version: &str,
        files: &[PackageFileRecord],
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO binpkg (name, version) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(name)
            .bind(version)
            .execute(&mut *self.tx)
            .await?;

        for record in files {
            let arch = record.architecture.as_deref().unwrap_or("all");
            sqlx::query("INSERT INTO architectures (name) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(arch)
                .execute(&mut *self.tx)
                .await?;
            self.upsert_file(record).await?;
            sqlx::query(
                "INSERT INTO binpkg_files (binpkg_name, binpkg_version, file_sha256, architecture)
                 VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            )
            .bind(name)
            .bind(version)
            .bind(&record.file.sha256)
            .bind(arch)
            .execute(&mut *self.tx)
            .await?;
            self.record_observation(record).await?;
        }
        Ok(())
    }

    /// Record a bare file observation (installer files and index files that
    /// belong to no package).
    pub async fn record_file(&mut self, record: &PackageFileRecord) -> StoreResult<()> {
        self.upsert_file(record).await?;
        self.record_observation(record).await
    }

    /// Mark the tuple provisioned and commit.
    pub async fn commit(mut self) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO provisioned
                 (archive_name, timestamp_value, suite_name, component_name, architecture)
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        )
        .bind(&self.tuple.archive)
        .bind(&self.tuple.timestamp)
        .bind(&self.tuple.suite)
        .bind(&self.tuple.component)
        .bind(&self.tuple.architecture)
        .execute(&mut *self.tx)
        .await?;
        self.tx.commit().await?;
        Ok(())
    }

    async fn upsert_file(&mut self, record: &PackageFileRecord) -> StoreResult<()> {
        let existing = sqlx::query("SELECT size FROM files WHERE sha256 = $1")
            .bind(&record.file.sha256)
            .fetch_optional(&mut *self.tx)
            .await?;
        match existing {
            Some(row) => {
                let stored: i64 = row.get("size");
                if stored as u64 != record.file.size {
                    return Err(StoreError::SizeDrift {
                        sha256: record.file.sha256.clone(),
                        stored: stored as u64,
                        observed: record.file.size,
                    });
                }
            }
            None => {
                sqlx::query("INSERT INTO files (sha256, size) VALUES ($1, $2)")
                    .bind(&record.file.sha256)
                    .bind(record.file.size as i64)
                    .execute(&mut *self.tx)
                    .await?;
            }
        }
        Ok(())
    }

    async fn upsert_location(&mut self, record: &PackageFileRecord) -> StoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO locations (archive_name, suite_name, component_name, path, name)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (archive_name, suite_name, component_name, path, name)
                 DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
        )
        .bind(&self.tuple.archive)
        .bind(&self.tuple.suite)
        .bind(&self.tuple.component)
        .bind(&record.path)
        .bind(&record.name)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get("id"))
    }

    /// Insert the observation and fold it into the coalesced ranges.
    async fn record_observation(&mut self, record: &PackageFileRecord) -> StoreResult<()> {
        let location_id = self.upsert_location(record).await?;
        let arch = record.architecture.as_deref().unwrap_or("");
        let t = self.tuple.timestamp.clone();

        let t_prev: Option<String> = sqlx::query(
            "SELECT MAX(value) AS value FROM timestamps WHERE archive_name = $1 AND value < $2",
        )
        .bind(&self.tuple.archive)
        .bind(&t)
        .fetch_one(&mut *self.tx)
        .await?
        .get("value");
        let t_next: Option<String> = sqlx::query(
            "SELECT MIN(value) AS value FROM timestamps WHERE archive_name = $1 AND value > $2",
        )
        .bind(&self.tuple.archive)
        .bind(&t)
        .fetch_one(&mut *self.tx)
        .await?
        .get("value");

        let ranges: Vec<TimestampRange> = sqlx::query(
            "SELECT begin_at, end_at FROM file_timestamp_ranges
             WHERE file_sha256 = $1 AND location_id = $2 AND architecture = $3",
        )
        .bind(&record.file.sha256)
        .bind(location_id)
        .bind(arch)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(|row| TimestampRange {
            begin: row.get("begin_at"),
            end: row.get("end_at"),
        })
        .collect();

        let plan = coalesce::plan(&t, t_prev.as_deref(), t_next.as_deref(), &ranges);
        debug!(sha256 = %record.file.sha256, location_id, %t, ?plan, "coalescing observation");

        match plan {
            CoalescePlan::AlreadyCovered => {}
            CoalescePlan::Insert => {
                sqlx::query(
                    "INSERT INTO file_timestamp_ranges
                         (file_sha256, location_id, architecture, begin_at, end_at)
                     VALUES ($1, $2, $3, $4, $4)",
                )
                .bind(&record.file.sha256)
                .bind(location_id)
                .bind(arch)
                .bind(&t)
                .execute(&mut *self.tx)
                .await?;
            }
            CoalescePlan::ExtendLeft { begin } => {
                sqlx::query(
                    "UPDATE file_timestamp_ranges SET end_at = $1
                     WHERE file_sha256 = $2 AND location_id = $3 AND architecture = $4
                       AND begin_at = $5",
                )
                .bind(&t)
                .bind(&record.file.sha256)
                .bind(location_id)
                .bind(arch)
                .bind(&begin)
                .execute(&mut *self.tx)
                .await?;
            }
            CoalescePlan::ExtendRight { old_begin } => {
                sqlx::query(
                    "UPDATE file_timestamp_ranges SET begin_at = $1
                     WHERE file_sha256 = $2 AND location_id = $3 AND architecture = $4
                       AND begin_at = $5",
                )
                .bind(&t)
                .bind(&record.file.sha256)
                .bind(location_id)
                .bind(arch)
                .bind(&old_begin)
                .execute(&mut *self.tx)
                .await?;
            }
            CoalescePlan::Merge {
                left_begin,
                right_begin,
                right_end,
            } => {
                sqlx::query(
                    "DELETE FROM file_timestamp_ranges
                     WHERE file_sha256 = $1 AND location_id = $2 AND architecture = $3
                       AND begin_at = $4",
                )
                .bind(&record.file.sha256)
                .bind(location_id)
                .bind(arch)
                .bind(&right_begin)
                .execute(&mut *self.tx)
                .await?;
                sqlx::query(
                    "UPDATE file_timestamp_ranges SET end_at = $1
                     WHERE file_sha256 = $2 AND location_id = $3 AND architecture = $4
                       AND begin_at = $5",
                )
                .bind(&right_end)
                .bind(&record.file.sha256)
                .bind(location_id)
                .bind(arch)
                .bind(&left_begin)
                .execute(&mut *self.tx)
                .await?;
            }
        }
        Ok(())
    }
}
