// fathom-server/src/auth.rs
// ============================================================================
// Module: Fathom Server Auth
// Description: Optional `X-API-Key` bearer check.
// Purpose: `spec.md` §6.1 "optional `X-API-Key` auth".
// Dependencies: axum
// ============================================================================

use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::server::ServerState;

/// Header carrying the caller-supplied API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Rejects the request unless `state.config.api_key` is unset or matches
/// the caller's `X-API-Key` header.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] when a key is configured and the
/// header is missing or does not match.
pub async fn require_api_key(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    if header_matches(request.headers(), expected) {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Returns whether the `X-API-Key` header equals `expected`.
fn header_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|candidate| candidate == expected)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use axum::http::HeaderValue;

    use super::header_matches;
    use super::API_KEY_HEADER;

    #[test]
    fn matches_exact_header_value() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(header_matches(&headers, "secret"));
        assert!(!header_matches(&headers, "other"));
    }

    #[test]
    fn missing_header_never_matches() {
        let headers = HeaderMap::new();
        assert!(!header_matches(&headers, "secret"));
    }
}
