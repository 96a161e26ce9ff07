//! In-memory store implementations for tests and local development.
//! One mutex guards all state so cross-store operations (for example
//! complete-and-grant) are atomic the way the real database makes them.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ledger::ports::{
    DebitOutcome, EntryKind, GrantOutcome, HistoryPage, LedgerEntry, LedgerStore,
};
use crate::payment::ports::{
    CompletionOutcome, FailOutcome, IntentStatus, NewPaymentIntent, PaymentIntent,
    PaymentIntentStore,
};
use crate::subscription::ports::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};
use crate::UserId;

#[derive(Default)]
struct Inner {
    balances: HashMap<UserId, i64>,
    entries: Vec<LedgerEntry>,
    idempotency_keys: HashSet<String>,
    intents: HashMap<String, PaymentIntent>,
    subscriptions: HashMap<String, SubscriptionRecord>,
    next_seq: i64,
}

impl Inner {
    fn append_entry(
        &mut self,
        user_id: UserId,
        kind: EntryKind,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) {
        self.next_seq += 1;
        self.entries.push(LedgerEntry {
            id: Uuid::new_v4(),
            seq: self.next_seq,
            user_id,
            kind,
            amount,
            reason: reason.to_string(),
            idempotency_key: idempotency_key.to_string(),
            created_at: Utc::now(),
        });
    }

    /// Shared grant path for LedgerStore::grant and complete_and_grant.
    fn apply_grant(
        &mut self,
        user_id: UserId,
        amount: i64,
        kind: EntryKind,
        idempotency_key: &str,
        reason: &str,
    ) -> GrantOutcome {
        if self.idempotency_keys.contains(idempotency_key) {
            let balance = self.balances.get(&user_id).copied().unwrap_or(0);
            return GrantOutcome {
                applied: false,
                balance,
            };
        }
        self.idempotency_keys.insert(idempotency_key.to_string());
        let balance = self.balances.entry(user_id).or_insert(0);
        *balance += amount;
        let balance = *balance;
        self.append_entry(user_id, kind, amount, reason, idempotency_key);
        GrantOutcome {
            applied: true,
            balance,
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a balance directly, bypassing the ledger. Test setup only.
    pub async fn seed_balance(&self, user_id: UserId, balance: i64) {
        let mut inner = self.inner.lock().await;
        inner.balances.insert(user_id, balance);
    }

    pub async fn entry_count(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        reason: &str,
    ) -> anyhow::Result<DebitOutcome> {
        let mut inner = self.inner.lock().await;
        let balance = inner.balances.get(&user_id).copied().unwrap_or(0);
        if balance < amount {
            return Ok(DebitOutcome::InsufficientBalance { balance });
        }
        let remaining = balance - amount;
        inner.balances.insert(user_id, remaining);
        inner.append_entry(user_id, EntryKind::Debit, -amount, reason, "");
        Ok(DebitOutcome::Accepted { remaining })
    }

    async fn grant(
        &self,
        user_id: UserId,
        amount: i64,
        kind: EntryKind,
        idempotency_key: &str,
        reason: &str,
    ) -> anyhow::Result<GrantOutcome> {
        let mut inner = self.inner.lock().await;
        Ok(inner.apply_grant(user_id, amount, kind, idempotency_key, reason))
    }

    async fn balance(&self, user_id: UserId) -> anyhow::Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.balances.get(&user_id).copied().unwrap_or(0))
    }

    async fn history(
        &self,
        user_id: UserId,
        limit: i64,
        before: Option<i64>,
    ) -> anyhow::Result<HistoryPage> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<LedgerEntry> = inner
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| before.map_or(true, |b| e.seq < b))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        let has_more = entries.len() as i64 > limit;
        entries.truncate(limit as usize);
        let next_before = if has_more {
            entries.last().map(|e| e.seq)
        } else {
            None
        };
        Ok(HistoryPage {
            entries,
            next_before,
        })
    }
}

#[async_trait]
impl PaymentIntentStore for InMemoryStore {
    async fn create_intent(&self, intent: NewPaymentIntent) -> anyhow::Result<PaymentIntent> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let intent = PaymentIntent {
            order_id: intent.order_id,
            user_id: intent.user_id,
            plan_id: intent.plan_id,
            expected_amount: intent.expected_amount,
            currency: intent.currency,
            credits_to_grant: intent.credits_to_grant,
            status: IntentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.intents.insert(intent.order_id.clone(), intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, order_id: &str) -> anyhow::Result<Option<PaymentIntent>> {
        let inner = self.inner.lock().await;
        Ok(inner.intents.get(order_id).cloned())
    }

    async fn complete_and_grant(&self, order_id: &str) -> anyhow::Result<CompletionOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(intent) = inner.intents.get(order_id).cloned() else {
            return Ok(CompletionOutcome::NotFound);
        };
        if intent.status.is_terminal() {
            return Ok(CompletionOutcome::AlreadyTerminal(intent.status));
        }
        let reason = format!("purchase:{}", intent.plan_id);
        let outcome = inner.apply_grant(
            intent.user_id,
            intent.credits_to_grant,
            EntryKind::Grant,
            order_id,
            &reason,
        );
        let stored = inner
            .intents
            .get_mut(order_id)
            .expect("intent present under lock");
        stored.status = IntentStatus::Completed;
        stored.updated_at = Utc::now();
        Ok(CompletionOutcome::Completed {
            balance: outcome.balance,
        })
    }

    async fn mark_failed(&self, order_id: &str) -> anyhow::Result<FailOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(intent) = inner.intents.get_mut(order_id) else {
            return Ok(FailOutcome::NotFound);
        };
        if intent.status.is_terminal() {
            return Ok(FailOutcome::AlreadyTerminal(intent.status));
        }
        intent.status = IntentStatus::Failed;
        intent.updated_at = Utc::now();
        Ok(FailOutcome::Failed)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> anyhow::Result<Vec<PaymentIntent>> {
        let inner = self.inner.lock().await;
        let mut intents: Vec<PaymentIntent> = inner
            .intents
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        intents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        intents.truncate(limit as usize);
        Ok(intents)
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn upsert(&self, record: SubscriptionRecord) -> anyhow::Result<SubscriptionRecord> {
        let mut inner = self.inner.lock().await;
        let record = match inner.subscriptions.get(&record.provider_subscription_id) {
            Some(existing) => SubscriptionRecord {
                created_at: existing.created_at,
                updated_at: Utc::now(),
                ..record
            },
            None => record,
        };
        inner
            .subscriptions
            .insert(record.provider_subscription_id.clone(), record.clone());
        Ok(record)
    }

    async fn get(
        &self,
        provider_subscription_id: &str,
    ) -> anyhow::Result<Option<SubscriptionRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.subscriptions.get(provider_subscription_id).cloned())
    }

    async fn get_active_for_user(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<SubscriptionRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id && s.status == SubscriptionStatus::Active)
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn set_status(
        &self,
        provider_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.subscriptions.get_mut(provider_subscription_id) {
            Some(record) => {
                record.status = status;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
