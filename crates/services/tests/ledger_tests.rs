use std::sync::Arc;

use services::ledger::{CostTable, CreditLedger, DebitGateway, DebitOutcome};
use services::ledger::gateway::Authorization;
use services::test_helpers::InMemoryStore;
use services::UserId;

fn ledger_over(store: Arc<InMemoryStore>) -> Arc<CreditLedger> {
    Arc::new(CreditLedger::new(store))
}

#[tokio::test]
async fn test_debit_reduces_balance_and_appends_entry() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 10).await;

    let outcome = ledger.debit(user, 3, "gpt-small:1000tok").await.unwrap();
    assert_eq!(outcome, DebitOutcome::Accepted { remaining: 7 });
    assert_eq!(ledger.balance(user).await.unwrap(), 7);
    assert_eq!(store.entry_count().await, 1);
}

#[tokio::test]
async fn test_insufficient_balance_leaves_ledger_unchanged() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 5).await;

    let outcome = ledger.debit(user, 6, "gpt-small:6000tok").await.unwrap();
    assert_eq!(outcome, DebitOutcome::InsufficientBalance { balance: 5 });
    assert_eq!(ledger.balance(user).await.unwrap(), 5);
    assert_eq!(store.entry_count().await, 0);
}

#[tokio::test]
async fn test_debit_unknown_user_is_rejected_at_zero() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store);
    let outcome = ledger.debit(UserId::new(), 1, "x").await.unwrap();
    assert_eq!(outcome, DebitOutcome::InsufficientBalance { balance: 0 });
}

#[tokio::test]
async fn test_debit_rejects_non_positive_amounts() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store);
    let user = UserId::new();
    assert!(ledger.debit(user, 0, "x").await.is_err());
    assert!(ledger.debit(user, -5, "x").await.is_err());
}

#[tokio::test]
async fn test_concurrent_debits_never_overdraw() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 10).await;

    // 6 + 7 > 10, so under any interleaving exactly one can succeed.
    let a = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.debit(user, 6, "a").await.unwrap() })
    };
    let b = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.debit(user, 7, "b").await.unwrap() })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let accepted = [a, b]
        .iter()
        .filter(|o| matches!(o, DebitOutcome::Accepted { .. }))
        .count();
    assert_eq!(accepted, 1);
    let balance = ledger.balance(user).await.unwrap();
    assert!(balance == 4 || balance == 3);
    assert!(balance >= 0);
}

#[tokio::test]
async fn test_grant_is_idempotent_under_replay() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();

    let first = ledger.grant(user, 100, "ord_abc", "purchase:starter").await.unwrap();
    assert!(first.applied);
    assert_eq!(first.balance, 100);

    for _ in 0..5 {
        let replay = ledger.grant(user, 100, "ord_abc", "purchase:starter").await.unwrap();
        assert!(!replay.applied);
        assert_eq!(replay.balance, 100);
    }
    assert_eq!(ledger.balance(user).await.unwrap(), 100);
    assert_eq!(store.entry_count().await, 1);
}

#[tokio::test]
async fn test_grant_rejects_empty_idempotency_key() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store);
    assert!(ledger.grant(UserId::new(), 10, "", "x").await.is_err());
}

#[tokio::test]
async fn test_history_newest_first_with_pagination() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 100).await;

    for i in 0..5 {
        ledger.debit(user, 1, &format!("action-{}", i)).await.unwrap();
    }

    let page = ledger.history(user, 3, None).await.unwrap();
    assert_eq!(page.entries.len(), 3);
    assert_eq!(page.entries[0].reason, "action-4");
    assert_eq!(page.entries[2].reason, "action-2");
    let cursor = page.next_before.expect("more pages remain");

    let rest = ledger.history(user, 3, Some(cursor)).await.unwrap();
    assert_eq!(rest.entries.len(), 2);
    assert_eq!(rest.entries[0].reason, "action-1");
    assert_eq!(rest.entries[1].reason, "action-0");
    assert!(rest.next_before.is_none());
}

#[tokio::test]
async fn test_history_is_scoped_per_user() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let (alice, bob) = (UserId::new(), UserId::new());
    store.seed_balance(alice, 10).await;
    store.seed_balance(bob, 10).await;

    ledger.debit(alice, 1, "alice-action").await.unwrap();
    ledger.debit(bob, 1, "bob-action").await.unwrap();

    let page = ledger.history(alice, 10, None).await.unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].reason, "alice-action");
}

#[tokio::test]
async fn test_gateway_grants_and_debits_cost() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 20).await;

    let mut multipliers = std::collections::HashMap::new();
    multipliers.insert("gpt-large".to_string(), 4);
    let gateway = DebitGateway::new(ledger.clone(), CostTable::new(1000, 1, multipliers));

    // 2500 tokens = 3 units * 4 = 12 credits
    let auth = gateway.authorize(user, "gpt-large", 2500).await.unwrap();
    assert_eq!(
        auth,
        Authorization::Granted {
            cost: 12,
            remaining: 8
        }
    );
    assert_eq!(ledger.balance(user).await.unwrap(), 8);
}

#[tokio::test]
async fn test_gateway_insufficient_balance_reports_required() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 2).await;

    let mut multipliers = std::collections::HashMap::new();
    multipliers.insert("gpt-small".to_string(), 1);
    let gateway = DebitGateway::new(ledger.clone(), CostTable::new(1000, 1, multipliers));

    let auth = gateway.authorize(user, "gpt-small", 5000).await.unwrap();
    assert_eq!(
        auth,
        Authorization::InsufficientBalance {
            balance: 2,
            required: 5
        }
    );
    assert_eq!(ledger.balance(user).await.unwrap(), 2);
}

#[tokio::test]
async fn test_gateway_unknown_model_charges_nothing() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 100).await;

    let gateway = DebitGateway::new(
        ledger.clone(),
        CostTable::new(1000, 1, std::collections::HashMap::new()),
    );

    let auth = gateway.authorize(user, "mystery-model", 1000).await.unwrap();
    assert_eq!(
        auth,
        Authorization::UnknownModel {
            model_id: "mystery-model".to_string()
        }
    );
    assert_eq!(ledger.balance(user).await.unwrap(), 100);
}

#[tokio::test]
async fn test_refund_and_adjustment_are_recorded() {
    let store = InMemoryStore::new();
    let ledger = ledger_over(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 10).await;

    ledger.refund(user, 5, "refund-1", "operator refund").await.unwrap();
    ledger.adjust(user, 3, "adjust-1", "migration correction").await.unwrap();
    assert_eq!(ledger.balance(user).await.unwrap(), 18);

    let page = ledger.history(user, 10, None).await.unwrap();
    assert_eq!(page.entries.len(), 2);
}
