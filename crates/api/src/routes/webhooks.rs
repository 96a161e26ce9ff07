use crate::{error::ApiError, state::AppState};
use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use services::payment::{
    OneTimeNotification, OneTimeOutcome, ReconcileError, SubscriptionOutcome,
};
use utoipa::ToSchema;

/// Acknowledgement body returned for processed webhooks
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
}

fn reconcile_error(err: ReconcileError) -> ApiError {
    match err {
        ReconcileError::InvalidSignature => ApiError::bad_request("Invalid webhook signature"),
        ReconcileError::MalformedPayload(msg) => {
            ApiError::bad_request(format!("Malformed webhook payload: {}", msg))
        }
        // A 5xx makes the provider redeliver, which is what we want when
        // a verified payment could not be recorded.
        ReconcileError::Storage(msg) => {
            tracing::error!("Webhook storage error: {}", msg);
            ApiError::internal_server_error("Failed to process webhook")
        }
    }
}

/// POST /v1/webhooks/payment - One-time payment notification
#[utoipa::path(
    post,
    path = "/v1/webhooks/payment",
    tag = "Webhooks",
    request_body = OneTimeNotification,
    responses(
        (status = 200, description = "Notification processed", body = WebhookAck),
        (status = 400, description = "Invalid signature or payload")
    )
)]
pub async fn payment_webhook(
    State(app_state): State<AppState>,
    Json(notification): Json<OneTimeNotification>,
) -> Result<Json<WebhookAck>, ApiError> {
    let outcome = app_state
        .reconciliation
        .handle_one_time(&notification)
        .await
        .map_err(reconcile_error)?;

    let outcome = match outcome {
        OneTimeOutcome::Granted { .. } => "granted",
        OneTimeOutcome::AlreadyProcessed => "already_processed",
        OneTimeOutcome::MarkedFailed => "marked_failed",
        OneTimeOutcome::UnknownOrder => "unknown_order",
        OneTimeOutcome::AmountMismatch => "amount_mismatch",
    };
    Ok(Json(WebhookAck {
        received: true,
        outcome: outcome.to_string(),
    }))
}

/// POST /v1/webhooks/subscription - Subscription lifecycle event
#[utoipa::path(
    post,
    path = "/v1/webhooks/subscription",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Event processed", body = WebhookAck),
        (status = 400, description = "Invalid signature or payload")
    )
)]
pub async fn subscription_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing x-webhook-signature header"))?;

    let outcome = app_state
        .reconciliation
        .handle_subscription(&body, signature)
        .await
        .map_err(reconcile_error)?;

    let outcome = match outcome {
        SubscriptionOutcome::Upserted => "upserted".to_string(),
        SubscriptionOutcome::Canceled => "canceled".to_string(),
        SubscriptionOutcome::UnknownSubscription => "unknown_subscription".to_string(),
        SubscriptionOutcome::GrantApplied { .. } => "grant_applied".to_string(),
        SubscriptionOutcome::DuplicateInvoice => "duplicate_invoice".to_string(),
        SubscriptionOutcome::MarkedPastDue => "marked_past_due".to_string(),
        SubscriptionOutcome::Ignored(_) => "ignored".to_string(),
    };
    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}

/// Create webhooks router
pub fn create_webhooks_router() -> Router<AppState> {
    Router::new()
        .route("/v1/webhooks/payment", post(payment_webhook))
        .route("/v1/webhooks/subscription", post(subscription_webhook))
}
