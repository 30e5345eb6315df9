//! # Provenance store
//!
//! PostgreSQL-backed store recording which file was visible at which logical
//! archive location at which snapshot timestamp. The ingester is the only
//! writer; the query service reads. Observations are kept coalesced into
//! maximal closed timestamp ranges per `(file, location, architecture)`.

pub mod coalesce;
pub mod error;
pub mod models;
pub mod read;
pub mod schema;
pub mod write;

pub use error::{StoreError, StoreResult};
pub use models::{
    BinaryObservation, FileLocation, FileRef, PackageFileRecord, TimestampRange, TupleKey,
};
pub use write::ProvisioningTx;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Shared handle to the provenance database.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect to the database and run the idempotent schema bootstrap.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        schema::bootstrap(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests and the query service).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a handle without touching the database yet; the first query
    /// establishes the connection. No schema bootstrap happens.
    pub fn connect_lazy(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Sentinel timestamp marking a non-temporal ("multi-version") archive.
pub const SENTINEL_TIMESTAMP: &str = "99990101T000000Z";

/// Validate the canonical `YYYYMMDDThhmmssZ` timestamp form.
pub fn is_valid_timestamp(value: &str) -> bool {
    chrono::NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_validation() {
        assert!(is_valid_timestamp("20210221T150011Z"));
        assert!(is_valid_timestamp(SENTINEL_TIMESTAMP));
        assert!(!is_valid_timestamp("20210221T150011"));
        assert!(!is_valid_timestamp("2021-02-21T15:00:11Z"));
        assert!(!is_valid_timestamp("20211321T150011Z"));
    }
}
