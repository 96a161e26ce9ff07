use crate::{error::ApiError, state::AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use services::ledger::{Authorization, LedgerError};
use services::UserId;
use utoipa::ToSchema;

/// Request to authorize and charge a metered action
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    pub user_id: UserId,
    pub model_id: String,
    pub estimated_tokens: u64,
}

/// A granted authorization: the debit has already been applied
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeResponse {
    pub granted: bool,
    pub cost: i64,
    pub remaining: i64,
}

/// POST /internal/authorize - Charge for a metered action before dispatch.
/// Called by the serving layer, not by end users.
#[utoipa::path(
    post,
    path = "/internal/authorize",
    tag = "Internal",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Debit applied, action may run", body = AuthorizeResponse),
        (status = 402, description = "Insufficient credits"),
        (status = 404, description = "Unknown model")
    )
)]
pub async fn authorize(
    State(app_state): State<AppState>,
    Json(req): Json<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let outcome = app_state
        .gateway
        .authorize(req.user_id, &req.model_id, req.estimated_tokens)
        .await
        .map_err(|e| match e {
            LedgerError::InvalidAmount(msg) => ApiError::bad_request(msg),
            LedgerError::Storage(msg) => {
                tracing::error!("Ledger storage error during authorization: {}", msg);
                ApiError::internal_server_error("Failed to authorize action")
            }
        })?;

    match outcome {
        Authorization::Granted { cost, remaining } => Ok(Json(AuthorizeResponse {
            granted: true,
            cost,
            remaining,
        })),
        Authorization::InsufficientBalance { balance, required } => {
            Err(ApiError::payment_required("Insufficient credits")
                .with_details(format!("balance {} < required {}", balance, required)))
        }
        Authorization::UnknownModel { model_id } => {
            Err(ApiError::not_found(format!("Unknown model: {}", model_id)))
        }
    }
}

/// Create internal authorization router
pub fn create_authorize_router() -> Router<AppState> {
    Router::new().route("/internal/authorize", post(authorize))
}
