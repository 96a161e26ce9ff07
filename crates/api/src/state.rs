use std::sync::Arc;

use services::ledger::{CreditLedger, DebitGateway};
use services::payment::{CheckoutService, PaymentIntentStore, ReconciliationEngine};

/// Shared application state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<CreditLedger>,
    pub gateway: Arc<DebitGateway>,
    pub reconciliation: Arc<ReconciliationEngine>,
    pub checkout: Arc<CheckoutService>,
    pub intents: Arc<dyn PaymentIntentStore>,
}
