//! Idempotent schema bootstrap.

use sqlx::PgPool;

use crate::error::StoreResult;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS archives (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS timestamps (
    archive_name TEXT NOT NULL REFERENCES archives (name),
    value TEXT NOT NULL,
    PRIMARY KEY (archive_name, value)
);

CREATE TABLE IF NOT EXISTS suites (
    archive_name TEXT NOT NULL REFERENCES archives (name),
    name TEXT NOT NULL,
    PRIMARY KEY (archive_name, name)
);

CREATE TABLE IF NOT EXISTS components (
    archive_name TEXT NOT NULL,
    suite_name TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (archive_name, suite_name, name),
    FOREIGN KEY (archive_name, suite_name) REFERENCES suites (archive_name, name)
);

CREATE TABLE IF NOT EXISTS architectures (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS files (
    sha256 TEXT PRIMARY KEY CHECK (sha256 ~ '^[0-9a-f]{64}$'),
    size BIGINT NOT NULL CHECK (size >= 0)
);

CREATE TABLE IF NOT EXISTS srcpkg (
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    PRIMARY KEY (name, version)
);

CREATE TABLE IF NOT EXISTS binpkg (
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    PRIMARY KEY (name, version)
);

CREATE TABLE IF NOT EXISTS srcpkg_files (
    srcpkg_name TEXT NOT NULL,
    srcpkg_version TEXT NOT NULL,
    file_sha256 TEXT NOT NULL REFERENCES files (sha256),
    PRIMARY KEY (srcpkg_name, srcpkg_version, file_sha256),
    FOREIGN KEY (srcpkg_name, srcpkg_version) REFERENCES srcpkg (name, version)
);

CREATE TABLE IF NOT EXISTS binpkg_files (
    binpkg_name TEXT NOT NULL,
    binpkg_version TEXT NOT NULL,
    file_sha256 TEXT NOT NULL REFERENCES files (sha256),
    architecture TEXT NOT NULL REFERENCES architectures (name),
    PRIMARY KEY (binpkg_name, binpkg_version, file_sha256, architecture),
    FOREIGN KEY (binpkg_name, binpkg_version) REFERENCES binpkg (name, version)
);

CREATE TABLE IF NOT EXISTS locations (
    id BIGSERIAL PRIMARY KEY,
    archive_name TEXT NOT NULL,
    suite_name TEXT NOT NULL,
    component_name TEXT NOT NULL,
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    UNIQUE (archive_name, suite_name, component_name, path, name)
);

CREATE TABLE IF NOT EXISTS file_timestamp_ranges (
    file_sha256 TEXT NOT NULL REFERENCES files (sha256),
    location_id BIGINT NOT NULL REFERENCES locations (id),
    architecture TEXT NOT NULL,
    begin_at TEXT NOT NULL,
    end_at TEXT NOT NULL,
    PRIMARY KEY (file_sha256, location_id, architecture, begin_at),
    CHECK (begin_at <= end_at)
);

CREATE INDEX IF NOT EXISTS file_timestamp_ranges_location
    ON file_timestamp_ranges (location_id);

CREATE TABLE IF NOT EXISTS provisioned (
    archive_name TEXT NOT NULL,
    timestamp_value TEXT NOT NULL,
    suite_name TEXT NOT NULL,
    component_name TEXT NOT NULL,
    architecture TEXT NOT NULL,
    PRIMARY KEY (archive_name, timestamp_value, suite_name, component_name, architecture)
);
"#;

/// Create every table and index if not already present.
pub async fn bootstrap(pool: &PgPool) -> StoreResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
