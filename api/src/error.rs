//! API error to HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::API_VERSION;

/// Errors a handler can surface.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The named entity does not exist.
    #[error("not found")]
    NotFound,

    /// The request was malformed (bad multipart, bad buildinfo).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] debsnap_store::StoreError),
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(e) = &self {
            error!("store error: {e}");
        }
        let body = serde_json::json!({
            "_api": API_VERSION,
            "_comment": "debsnap",
        });
        (self.status_code(), Json(body)).into_response()
    }
}
