use api::{create_router, AppState};
use services::ledger::{CostTable, CreditLedger, DebitGateway};
use services::payment::{CheckoutService, ReconciliationEngine};
use services::signature::{BodySignature, FieldSignature};
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
        eprintln!("Continuing with environment variables...");
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api=debug,services=debug,database=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting credits API server...");

    // Load configuration from environment
    let config = config::Config::from_env();

    tracing::info!(
        "Database: {}:{}/{}",
        config.database.host,
        config.database.port,
        config.database.database
    );
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);

    if !config.payment.is_configured() {
        tracing::warn!("Payment webhook secrets are not configured; webhooks will be rejected");
    }

    // Create database and run migrations
    tracing::info!("Connecting to database...");
    let db = database::Database::from_config(&config.database)?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    // Get repositories
    let ledger_repo = db.ledger_repository();
    let intent_repo = db.payment_intent_repository();
    let subscription_repo = db.subscription_repository();

    // Create services
    tracing::info!("Initializing services...");
    let ledger = Arc::new(CreditLedger::new(ledger_repo));
    let gateway = Arc::new(DebitGateway::new(
        ledger.clone(),
        CostTable::from_config(&config.billing),
    ));

    let reconciliation = Arc::new(ReconciliationEngine::new(
        intent_repo.clone(),
        subscription_repo,
        ledger.clone(),
        FieldSignature::new(config.payment.onetime_webhook_secret.clone()),
        BodySignature::new(
            config.payment.subscription_webhook_secret.clone(),
            config.payment.signature_tolerance_secs.max(0) as u64,
        ),
        config.payment.merchant_id.clone(),
        config.billing.subscription_plan_credits.clone(),
    ));

    let packs: HashMap<String, config::CreditPack> = config
        .billing
        .credit_packs
        .iter()
        .map(|p| (p.id.clone(), p.clone()))
        .collect();
    let checkout = Arc::new(CheckoutService::new(
        intent_repo.clone(),
        packs,
        config.billing.currency.clone(),
    ));

    // Create application state
    let app_state = AppState {
        ledger,
        gateway,
        reconciliation,
        checkout,
        intents: intent_repo,
    };

    // Create router
    let app = create_router(app_state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
