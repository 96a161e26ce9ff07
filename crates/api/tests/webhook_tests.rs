mod common;

use common::{
    create_test_context, header_value, sign_onetime, sign_subscription, user_header,
    SIGNATURE_HEADER, USER_HEADER,
};
use serde_json::{json, Value};
use services::UserId;

async fn checkout_order(ctx: &common::TestContext, user: UserId) -> String {
    let response = ctx
        .server
        .post("/v1/credits/checkout")
        .add_header(USER_HEADER, user_header(user))
        .json(&json!({ "plan_id": "starter" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    body["order_id"].as_str().unwrap().to_string()
}

fn onetime_body(order_id: &str, amount: i64, status: &str) -> Value {
    json!({
        "merchant_id": common::MERCHANT_ID,
        "order_id": order_id,
        "amount": amount,
        "currency": "usd",
        "status": status,
        "signature": sign_onetime(order_id, amount, "usd", status),
    })
}

#[tokio::test]
async fn test_payment_webhook_grants_credits() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    let order_id = checkout_order(&ctx, user).await;

    let response = ctx
        .server
        .post("/v1/webhooks/payment")
        .json(&onetime_body(&order_id, 999, "success"))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["received"], true);
    assert_eq!(body["outcome"], "granted");
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 100);
}

#[tokio::test]
async fn test_payment_webhook_redelivery_grants_once() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    let order_id = checkout_order(&ctx, user).await;
    let body = onetime_body(&order_id, 999, "success");

    for i in 0..4 {
        let response = ctx.server.post("/v1/webhooks/payment").json(&body).await;
        assert_eq!(response.status_code(), 200);
        let ack: Value = response.json();
        let expected = if i == 0 { "granted" } else { "already_processed" };
        assert_eq!(ack["outcome"], expected);
    }
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 100);
}

#[tokio::test]
async fn test_payment_webhook_bad_signature_is_rejected() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    let order_id = checkout_order(&ctx, user).await;

    let mut body = onetime_body(&order_id, 999, "success");
    body["signature"] = json!("deadbeef");

    let response = ctx.server.post("/v1/webhooks/payment").json(&body).await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_payment_webhook_amount_mismatch_is_acked_without_grant() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    let order_id = checkout_order(&ctx, user).await;

    // Signed correctly for an amount that disagrees with the intent.
    let response = ctx
        .server
        .post("/v1/webhooks/payment")
        .json(&onetime_body(&order_id, 500, "success"))
        .await;
    assert_eq!(response.status_code(), 200);
    let ack: Value = response.json();
    assert_eq!(ack["outcome"], "amount_mismatch");
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_payment_webhook_failed_status_marks_intent() {
    let ctx = create_test_context().await;
    let user = UserId::new();
    let order_id = checkout_order(&ctx, user).await;

    let response = ctx
        .server
        .post("/v1/webhooks/payment")
        .json(&onetime_body(&order_id, 999, "failed"))
        .await;
    assert_eq!(response.status_code(), 200);
    let ack: Value = response.json();
    assert_eq!(ack["outcome"], "marked_failed");
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_payment_webhook_unknown_order_is_acked() {
    let ctx = create_test_context().await;
    let response = ctx
        .server
        .post("/v1/webhooks/payment")
        .json(&onetime_body("ord_unknown", 999, "success"))
        .await;
    assert_eq!(response.status_code(), 200);
    let ack: Value = response.json();
    assert_eq!(ack["outcome"], "unknown_order");
}

fn subscription_event(event_type: &str, object: Value) -> String {
    json!({
        "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
        "type": event_type,
        "data": { "object": object }
    })
    .to_string()
}

fn subscription_object(subscription_id: &str, user: UserId) -> Value {
    json!({
        "id": subscription_id,
        "customer": "cus_123",
        "metadata": { "user_id": user },
        "plan": "pro-monthly",
        "status": "active",
        "current_period_start": 1_700_000_000u64,
        "current_period_end": 1_702_592_000u64,
        "cancel_at_period_end": false
    })
}

#[tokio::test]
async fn test_subscription_webhook_requires_signature_header() {
    let ctx = create_test_context().await;
    let body = subscription_event(
        "customer.subscription.created",
        subscription_object("sub_1", UserId::new()),
    );
    let response = ctx
        .server
        .post("/v1/webhooks/subscription")
        .text(body)
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_subscription_lifecycle_and_invoice_grant() {
    let ctx = create_test_context().await;
    let user = UserId::new();

    let created = subscription_event(
        "customer.subscription.created",
        subscription_object("sub_1", user),
    );
    let response = ctx
        .server
        .post("/v1/webhooks/subscription")
        .add_header(SIGNATURE_HEADER, header_value(&sign_subscription(&created)))
        .text(created)
        .await;
    assert_eq!(response.status_code(), 200);
    let ack: Value = response.json();
    assert_eq!(ack["outcome"], "upserted");

    let invoice = subscription_event(
        "invoice.payment_succeeded",
        json!({ "id": "inv_1", "subscription": "sub_1" }),
    );
    let signature = sign_subscription(&invoice);

    for i in 0..3 {
        let response = ctx
            .server
            .post("/v1/webhooks/subscription")
            .add_header(SIGNATURE_HEADER, header_value(&signature))
            .text(invoice.clone())
            .await;
        assert_eq!(response.status_code(), 200);
        let ack: Value = response.json();
        let expected = if i == 0 { "grant_applied" } else { "duplicate_invoice" };
        assert_eq!(ack["outcome"], expected);
    }
    assert_eq!(ctx.ledger.balance(user).await.unwrap(), 500);
}

#[tokio::test]
async fn test_subscription_webhook_tampered_body_is_rejected() {
    let ctx = create_test_context().await;
    let body = subscription_event(
        "customer.subscription.created",
        subscription_object("sub_1", UserId::new()),
    );
    let signature = sign_subscription(&body);
    let tampered = body.replace("pro-monthly", "free-forever");

    let response = ctx
        .server
        .post("/v1/webhooks/subscription")
        .add_header(SIGNATURE_HEADER, header_value(&signature))
        .text(tampered)
        .await;
    assert_eq!(response.status_code(), 400);
}
