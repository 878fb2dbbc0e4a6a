use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use common_crypto::hash_api_key;
use common_http_errors::ApiError;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::app_state::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// True when the SHA-256 hex of `key` is one of the configured hashes.
pub fn key_allowed(key: &str, allowed_hashes: &[String]) -> bool {
    let digest = hash_api_key(key);
    allowed_hashes
        .iter()
        .any(|h| bool::from(h.as_bytes().ct_eq(digest.as_bytes())))
}

/// Rejects requests without a recognised `X-API-Key`. With no keys
/// configured every request is rejected.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    let verdict = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|key| key_allowed(key, &state.config.admin_key_hashes));
    match verdict {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            warn!(path = %request.uri().path(), "rejected unknown api key");
            Err(ApiError::Unauthorized { code: "unauthorized", trace_id: None })
        }
        None => Err(ApiError::Unauthorized { code: "unauthorized", trace_id: None }),
    }
}
