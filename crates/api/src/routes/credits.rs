use crate::{error::ApiError, routes::caller_id, state::AppState};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use services::ledger::{LedgerEntry, LedgerError};
use services::payment::{CheckoutError, PaymentIntent};
use utoipa::ToSchema;

/// Current credit balance for the caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    /// Sequence cursor from a previous page
    pub before: Option<i64>,
}

/// One page of ledger history, newest first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub entries: Vec<LedgerEntry>,
    /// Cursor for the next page; absent when exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_before: Option<i64>,
}

/// Request to start a credit pack purchase
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    /// Credit pack id from the configured catalog
    pub plan_id: String,
}

/// A created checkout, awaiting payment
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCheckoutResponse {
    pub order_id: String,
    pub plan_id: String,
    /// Expected charge in the currency's minor unit
    pub amount: i64,
    pub currency: String,
    pub credits: i64,
}

fn ledger_error(err: LedgerError) -> ApiError {
    match err {
        LedgerError::InvalidAmount(msg) => ApiError::bad_request(msg),
        LedgerError::Storage(msg) => {
            tracing::error!("Ledger storage error: {}", msg);
            ApiError::internal_server_error("Failed to access the credit ledger")
        }
    }
}

/// GET /v1/credits - Get the caller's credit balance
#[utoipa::path(
    get,
    path = "/v1/credits",
    tag = "Credits",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Missing caller identity")
    )
)]
pub async fn get_balance(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = caller_id(&headers)?;
    let balance = app_state.ledger.balance(user_id).await.map_err(ledger_error)?;
    Ok(Json(BalanceResponse { balance }))
}

/// GET /v1/credits/history - Get the caller's ledger history, newest first
#[utoipa::path(
    get,
    path = "/v1/credits/history",
    tag = "Credits",
    responses(
        (status = 200, description = "Ledger history page", body = HistoryResponse),
        (status = 401, description = "Missing caller identity")
    )
)]
pub async fn get_history(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_id = caller_id(&headers)?;
    let page = app_state
        .ledger
        .history(user_id, query.limit.unwrap_or(50), query.before)
        .await
        .map_err(ledger_error)?;
    Ok(Json(HistoryResponse {
        entries: page.entries,
        next_before: page.next_before,
    }))
}

/// GET /v1/credits/purchases - List the caller's payment intents, newest first
#[utoipa::path(
    get,
    path = "/v1/credits/purchases",
    tag = "Credits",
    responses(
        (status = 200, description = "Payment intents", body = Vec<PaymentIntent>),
        (status = 401, description = "Missing caller identity")
    )
)]
pub async fn list_purchases(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PaymentIntent>>, ApiError> {
    let user_id = caller_id(&headers)?;
    let intents = app_state
        .intents
        .list_for_user(user_id, 50)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list payment intents: {:#}", e);
            ApiError::internal_server_error("Failed to list purchases")
        })?;
    Ok(Json(intents))
}

/// POST /v1/credits/checkout - Create a pending purchase for a credit pack
#[utoipa::path(
    post,
    path = "/v1/credits/checkout",
    tag = "Credits",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Checkout created", body = CreateCheckoutResponse),
        (status = 400, description = "Unknown credit pack"),
        (status = 401, description = "Missing caller identity")
    )
)]
pub async fn create_checkout(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let user_id = caller_id(&headers)?;
    let intent = app_state
        .checkout
        .create_checkout(user_id, &req.plan_id)
        .await
        .map_err(|e| match e {
            CheckoutError::UnknownPlan(plan) => {
                ApiError::bad_request(format!("Unknown credit pack: {}", plan))
            }
            CheckoutError::Storage(msg) => {
                tracing::error!("Failed to create checkout: {}", msg);
                ApiError::internal_server_error("Failed to create checkout")
            }
        })?;

    Ok(Json(CreateCheckoutResponse {
        order_id: intent.order_id,
        plan_id: intent.plan_id,
        amount: intent.expected_amount,
        currency: intent.currency,
        credits: intent.credits_to_grant,
    }))
}

/// Create credits router
pub fn create_credits_router() -> Router<AppState> {
    Router::new()
        .route("/v1/credits", get(get_balance))
        .route("/v1/credits/history", get(get_history))
        .route("/v1/credits/purchases", get(list_purchases))
        .route("/v1/credits/checkout", post(create_checkout))
}
