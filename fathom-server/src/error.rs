// fathom-server/src/error.rs
// ============================================================================
// Module: Fathom Server Errors
// Description: Maps store/config failures onto HTTP status codes.
// Purpose: `spec.md` §6.1 status codes 200/400/401/404/429/500/503.
// Dependencies: axum, fathom-store-sqlite, thiserror
// ============================================================================

use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use fathom_store_sqlite::SqliteStoreError;
use serde::Serialize;
use thiserror::Error;

/// Failure surfaced by an HTTP handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No run/step/run matched the requested identifier.
    #[error("not found")]
    NotFound,
    /// The request was malformed (bad filter, bad paging, unknown codec).
    #[error("bad request: {0}")]
    BadRequest(String),
    /// `X-API-Key` was missing or did not match.
    #[error("unauthorized")]
    Unauthorized,
    /// The caller exceeded its configured per-IP request budget.
    #[error("rate limited")]
    RateLimited {
        /// Milliseconds the caller should wait before retrying.
        retry_after_ms: u64,
    },
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] SqliteStoreError),
}

/// Wire form of an error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Human-readable failure description.
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Store(SqliteStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let retry_after_ms = match &self {
            Self::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after_ms) = retry_after_ms {
            let retry_after_secs = retry_after_ms.div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
