pub mod authorize;
pub mod credits;
pub mod webhooks;

use crate::error::ApiError;
use crate::state::AppState;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use services::UserId;

/// Resolve the caller's identity from the x-user-id header. Identity is
/// established upstream by the gateway; this service only needs the id.
pub fn caller_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<UserId>().ok())
        .ok_or_else(ApiError::missing_user_header)
}

async fn health() -> &'static str {
    "ok"
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(credits::create_credits_router())
        .merge(webhooks::create_webhooks_router())
        .merge(authorize::create_authorize_router())
        .with_state(state)
}
