//! # Provenance query service
//!
//! Read-only HTTP API over the snapshot store: package, file and timestamp
//! lookups plus a buildinfo-driven solver that computes a minimal set of
//! snapshot timestamps covering a build's installed dependencies.

pub mod error;
pub mod solver;
pub mod web;

pub use error::{ApiError, ApiResult};
pub use web::{router, AppState};

/// API version reported in every response envelope.
pub const API_VERSION: &str = "0.3";
