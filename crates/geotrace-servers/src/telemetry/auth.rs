//! Shared-secret check on the `x-api-key` header.

use super::{error::ApiError, TelemetryState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject the request unless it carries the configured key. A state without
/// a key lets everything through.
pub async fn require_api_key(
    State(state): State<TelemetryState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.api_key.as_deref() {
        let presented = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected) {
            tracing::warn!(uri = %request.uri(), "rejected request with missing or wrong API key");
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}
