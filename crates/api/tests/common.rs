#![allow(dead_code)]

use api::{create_router, AppState};
use axum_test::TestServer;
use services::ledger::{CostTable, CreditLedger, DebitGateway};
use services::payment::{CheckoutService, ReconciliationEngine};
use services::signature::{BodySignature, FieldSignature};
use services::test_helpers::InMemoryStore;
use std::collections::HashMap;
use std::sync::Arc;

pub const MERCHANT_ID: &str = "merch_test";
pub const ONETIME_SECRET: &str = "onetime_test_secret";
pub const SUBSCRIPTION_SECRET: &str = "whsec_test_secret";

pub const USER_HEADER: http::HeaderName = http::HeaderName::from_static("x-user-id");
pub const SIGNATURE_HEADER: http::HeaderName =
    http::HeaderName::from_static("x-webhook-signature");

pub fn user_header(user: services::UserId) -> http::HeaderValue {
    http::HeaderValue::from_str(&user.to_string()).unwrap()
}

pub fn header_value(value: &str) -> http::HeaderValue {
    http::HeaderValue::from_str(value).unwrap()
}

/// A test server over in-memory stores, plus handles for seeding state
/// and asserting on it directly.
pub struct TestContext {
    pub server: TestServer,
    pub store: Arc<InMemoryStore>,
    pub ledger: Arc<CreditLedger>,
}

pub async fn create_test_context() -> TestContext {
    let store = InMemoryStore::new();
    let ledger = Arc::new(CreditLedger::new(store.clone()));

    let mut multipliers = HashMap::new();
    multipliers.insert("gpt-large".to_string(), 4);
    multipliers.insert("gpt-small".to_string(), 1);
    let gateway = Arc::new(DebitGateway::new(
        ledger.clone(),
        CostTable::new(1000, 1, multipliers),
    ));

    let mut plan_credits = HashMap::new();
    plan_credits.insert("pro-monthly".to_string(), 500);
    let reconciliation = Arc::new(ReconciliationEngine::new(
        store.clone(),
        store.clone(),
        ledger.clone(),
        FieldSignature::new(ONETIME_SECRET),
        BodySignature::new(SUBSCRIPTION_SECRET, 300),
        MERCHANT_ID.to_string(),
        plan_credits,
    ));

    let mut packs = HashMap::new();
    packs.insert(
        "starter".to_string(),
        config::CreditPack {
            id: "starter".to_string(),
            credits: 100,
            amount_minor: 999,
        },
    );
    let checkout = Arc::new(CheckoutService::new(
        store.clone(),
        packs,
        "usd".to_string(),
    ));

    let state = AppState {
        ledger: ledger.clone(),
        gateway,
        reconciliation,
        checkout,
        intents: store.clone(),
    };

    let server = TestServer::new(create_router(state)).expect("Failed to build test server");
    TestContext {
        server,
        store,
        ledger,
    }
}

/// Sign a one-time notification body the way the provider would.
pub fn sign_onetime(order_id: &str, amount: i64, currency: &str, status: &str) -> String {
    FieldSignature::new(ONETIME_SECRET).sign(MERCHANT_ID, order_id, amount, currency, status)
}

/// Produce a subscription webhook signature header valid right now.
pub fn sign_subscription(body: &str) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    BodySignature::new(SUBSCRIPTION_SECRET, 300).sign_at(body, now)
}
