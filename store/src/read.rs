//! Read path: the queries behind the `/mr` API.

use sqlx::Row;

use crate::error::StoreResult;
use crate::models::{BinaryObservation, FileLocation, TimestampRange};
use crate::Store;

impl Store {
    /// All distinct source package names, sorted.
    pub async fn source_package_names(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT name FROM srcpkg ORDER BY name")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|r| r.get("name")).collect())
    }

    /// Versions of one source package, sorted.
    pub async fn source_package_versions(&self, name: &str) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT version FROM srcpkg WHERE name = $1 ORDER BY version")
            .bind(name)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|r| r.get("version")).collect())
    }

    /// File hashes of one source package version; `None` when the package
    /// version is unknown.
    pub async fn source_package_files(
        &self,
        name: &str,
        version: &str,
    ) -> StoreResult<Option<Vec<String>>> {
        let exists = sqlx::query("SELECT 1 FROM srcpkg WHERE name = $1 AND version = $2")
            .bind(name)
            .bind(version)
            .fetch_optional(self.pool())
            .await?;
        if exists.is_none() {
            return Ok(None);
        }
        let rows = sqlx::query(
            "SELECT file_sha256 FROM srcpkg_files
             WHERE srcpkg_name = $1 AND srcpkg_version = $2 ORDER BY file_sha256",
        )
        .bind(name)
        .bind(version)
        .fetch_all(self.pool())
        .await?;
        Ok(Some(rows.into_iter().map(|r| r.get("file_sha256")).collect()))
    }

    /// Versions of one binary package, sorted.
    pub async fn binary_package_versions(&self, name: &str) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT version FROM binpkg WHERE name = $1 ORDER BY version")
            .bind(name)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|r| r.get("version")).collect())
    }

    /// `(sha256, architecture)` pairs of one binary package version; `None`
    /// when the package version is unknown.
    pub async fn binary_package_files(
        &self,
        name: &str,
        version: &str,
    ) -> StoreResult<Option<Vec<(String, String)>>> {
        let exists = sqlx::query("SELECT 1 FROM binpkg WHERE name = $1 AND version = $2")
            .bind(name)
            .bind(version)
            .fetch_optional(self.pool())
            .await?;
        if exists.is_none() {
            return Ok(None);
        }
        let rows = sqlx::query(
            "SELECT file_sha256, architecture FROM binpkg_files
             WHERE binpkg_name = $1 AND binpkg_version = $2
             ORDER BY file_sha256, architecture",
        )
        .bind(name)
        .bind(version)
        .fetch_all(self.pool())
        .await?;
        Ok(Some(
            rows.into_iter()
                .map(|r| (r.get("file_sha256"), r.get("architecture")))
                .collect(),
        ))
    }

    /// Every known file hash, sorted.
    pub async fn all_file_hashes(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT sha256 FROM files ORDER BY sha256")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|r| r.get("sha256")).collect())
    }

    /// Whether a file hash is known.
    pub async fn file_exists(&self, sha256: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM files WHERE sha256 = $1")
            .bind(sha256)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Recorded size of a file, when known.
    pub async fn file_size(&self, sha256: &str) -> StoreResult<Option<u64>> {
        let row = sqlx::query("SELECT size FROM files WHERE sha256 = $1")
            .bind(sha256)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("size") as u64))
    }

    /// Every location descriptor of one file, with coalesced ranges.
    pub async fn file_locations(&self, sha256: &str) -> StoreResult<Vec<FileLocation>> {
        let rows = sqlx::query(
            "SELECT f.size, l.id, l.archive_name, l.suite_name, l.component_name,
                    l.path, l.name, r.begin_at, r.end_at
             FROM file_timestamp_ranges r
             JOIN locations l ON l.id = r.location_id
             JOIN files f ON f.sha256 = r.file_sha256
             WHERE r.file_sha256 = $1
             ORDER BY l.archive_name, l.suite_name, l.component_name, l.path, l.name,
                      l.id, r.begin_at",
        )
        .bind(sha256)
        .fetch_all(self.pool())
        .await?;

        let mut locations: Vec<FileLocation> = Vec::new();
        let mut current_id: Option<i64> = None;
        for row in rows {
            let id: i64 = row.get("id");
            let begin: String = row.get("begin_at");
            let end: String = row.get("end_at");
            if current_id != Some(id) {
                current_id = Some(id);
                locations.push(FileLocation {
                    name: row.get("name"),
                    path: row.get("path"),
                    size: row.get("size"),
                    archive_name: row.get("archive_name"),
                    suite_name: row.get("suite_name"),
                    component_name: row.get("component_name"),
                    timestamp_ranges: Vec::new(),
                    first_seen: begin.clone(),
                    last_seen: end.clone(),
                });
            }
            let location = locations.last_mut().expect("pushed above");
            if begin < location.first_seen {
                location.first_seen = begin.clone();
            }
            if end > location.last_seen {
                location.last_seen = end.clone();
            }
            location.timestamp_ranges.push((begin, end));
        }
        Ok(locations)
    }

    /// All timestamps of an archive, sorted.
    pub async fn archive_timestamps(&self, archive: &str) -> StoreResult<Vec<String>> {
        let rows =
            sqlx::query("SELECT value FROM timestamps WHERE archive_name = $1 ORDER BY value")
                .bind(archive)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|r| r.get("value")).collect())
    }

    /// Archive timestamps within a closed interval, sorted.
    pub async fn timestamps_between(
        &self,
        archive: &str,
        begin: &str,
        end: &str,
    ) -> StoreResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT value FROM timestamps
             WHERE archive_name = $1 AND value >= $2 AND value <= $3 ORDER BY value",
        )
        .bind(archive)
        .bind(begin)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|r| r.get("value")).collect())
    }

    /// Exact match, or the greatest timestamp before the query.
    pub async fn resolve_timestamp(
        &self,
        archive: &str,
        query: &str,
    ) -> StoreResult<Option<String>> {
        let row = sqlx::query(
            "SELECT MAX(value) AS value FROM timestamps
             WHERE archive_name = $1 AND value <= $2",
        )
        .bind(archive)
        .bind(query)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get("value"))
    }

    /// The most recent timestamp of an archive.
    pub async fn latest_timestamp(&self, archive: &str) -> StoreResult<Option<String>> {
        let row = sqlx::query("SELECT MAX(value) AS value FROM timestamps WHERE archive_name = $1")
            .bind(archive)
            .fetch_one(self.pool())
            .await?;
        Ok(row.get("value"))
    }

    /// Every placement of one binary package version, grouped per
    /// (architecture, archive, suite, component). Input to the buildinfo
    /// solver.
    pub async fn binary_observations(
        &self,
        name: &str,
        version: &str,
    ) -> StoreResult<Vec<BinaryObservation>> {
        let rows = sqlx::query(
            "SELECT bf.architecture, l.archive_name, l.suite_name, l.component_name,
                    r.begin_at, r.end_at
             FROM binpkg_files bf
             JOIN file_timestamp_ranges r
               ON r.file_sha256 = bf.file_sha256 AND r.architecture = bf.architecture
             JOIN locations l ON l.id = r.location_id
             WHERE bf.binpkg_name = $1 AND bf.binpkg_version = $2
             ORDER BY bf.architecture, l.archive_name, l.suite_name, l.component_name,
                      r.begin_at",
        )
        .bind(name)
        .bind(version)
        .fetch_all(self.pool())
        .await?;

        let mut observations: Vec<BinaryObservation> = Vec::new();
        for row in rows {
            let architecture: String = row.get("architecture");
            let archive_name: String = row.get("archive_name");
            let suite_name: String = row.get("suite_name");
            let component_name: String = row.get("component_name");
            let range = TimestampRange {
                begin: row.get("begin_at"),
                end: row.get("end_at"),
            };

            match observations.last_mut() {
                Some(last)
                    if last.architecture == architecture
                        && last.archive_name == archive_name
                        && last.suite_name == suite_name
                        && last.component_name == component_name =>
                {
                    last.ranges.push(range);
                }
                _ => observations.push(BinaryObservation {
                    architecture,
                    archive_name,
                    suite_name,
                    component_name,
                    ranges: vec![range],
                }),
            }
        }
        Ok(observations)
    }
}
