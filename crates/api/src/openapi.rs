use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Credits API",
        description = "Credit ledger and payment reconciliation service"
    ),
    paths(
        crate::routes::credits::get_balance,
        crate::routes::credits::get_history,
        crate::routes::credits::list_purchases,
        crate::routes::credits::create_checkout,
        crate::routes::webhooks::payment_webhook,
        crate::routes::webhooks::subscription_webhook,
        crate::routes::authorize::authorize,
    ),
    components(schemas(
        crate::error::ApiErrorResponse,
        crate::routes::credits::BalanceResponse,
        crate::routes::credits::HistoryResponse,
        crate::routes::credits::CreateCheckoutRequest,
        crate::routes::credits::CreateCheckoutResponse,
        crate::routes::webhooks::WebhookAck,
        crate::routes::authorize::AuthorizeRequest,
        crate::routes::authorize::AuthorizeResponse,
        services::ledger::LedgerEntry,
        services::ledger::EntryKind,
        services::payment::PaymentIntent,
        services::payment::IntentStatus,
        services::payment::OneTimeNotification,
        services::UserId,
    )),
    tags(
        (name = "Credits", description = "Balance, history, and purchases"),
        (name = "Webhooks", description = "Payment provider notifications"),
        (name = "Internal", description = "Service-to-service endpoints")
    )
)]
pub struct ApiDoc;
