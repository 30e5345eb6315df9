//! # Snapshot mirror
//!
//! Ingestion engine for a local replica of a Debian snapshot archive. For a
//! selection of (archive, timestamp, suite, component, architecture) tuples
//! it fetches the repository indexes from the upstream snapshot service,
//! downloads every referenced package into a content-addressed `by-hash`
//! tree, hard-links the canonical per-timestamp paths onto it, and records
//! full provenance in the store.

pub mod config;
pub mod error;
pub mod fetch;
pub mod hasher;
pub mod ingest;
pub mod layout;
pub mod lock;

pub use config::{Config, IngestFlags};
pub use error::{MirrorError, MirrorResult};
pub use ingest::{Ingester, RunSummary, Selection, TimestampSelector};
