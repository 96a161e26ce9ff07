mod common;

use common::create_test_context;
use serde_json::{json, Value};
use services::UserId;

#[tokio::test]
async fn test_authorize_debits_and_grants() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    ctx.store.seed_balance(user, 20).await;

    let response = ctx
        .server
        .post("/internal/authorize")
        .json(&json!({
            "user_id": user,
            "model_id": "gpt-large",
            "estimated_tokens": 2500
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["granted"], true);
    assert_eq!(body["cost"], 12);
    assert_eq!(body["remaining"], 8);
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 8);
}

#[tokio::test]
async fn test_authorize_insufficient_credits_is_402() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    ctx.store.seed_balance(user, 2).await;

    let response = ctx
        .server
        .post("/internal/authorize")
        .json(&json!({
            "user_id": user,
            "model_id": "gpt-small",
            "estimated_tokens": 5000
        }))
        .await;
    assert_eq!(response.status_code(), 402);
    let body: Value = response.json();
    assert_eq!(body["code"], "payment_required");
    // Rejection must not change the balance.
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 2);
}

#[tokio::test]
async fn test_authorize_unknown_model_is_404() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    ctx.store.seed_balance(user, 100).await;

    let response = ctx
        .server
        .post("/internal/authorize")
        .json(&json!({
            "user_id": user,
            "model_id": "mystery-model",
            "estimated_tokens": 1000
        }))
        .await;
    assert_eq!(response.status_code(), 404);
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 100);
}

#[tokio::test]
async fn test_authorize_minimum_charge_applies() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    ctx.store.seed_balance(user, 5).await;

    // Tiny estimates still cost the minimum of one credit.
    let response = ctx
        .server
        .post("/internal/authorize")
        .json(&json!({
            "user_id": user,
            "model_id": "gpt-small",
            "estimated_tokens": 1
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["cost"], 1);
    assert_eq!(body["remaining"], 4);
}
