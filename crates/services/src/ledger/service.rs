use std::sync::Arc;

use super::ports::{
    DebitOutcome, EntryKind, GrantOutcome, HistoryPage, LedgerError, LedgerStore,
};
use crate::UserId;

/// Maximum page size for history reads.
const HISTORY_MAX_LIMIT: i64 = 100;

/// The authoritative credit ledger. Wraps a [`LedgerStore`] with amount
/// validation and audit logging; all balance mutations in the system go
/// through this type.
pub struct CreditLedger {
    store: Arc<dyn LedgerStore>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Attempt to debit `amount` credits. Safe under concurrent calls for
    /// the same user: the store serializes read-compare-write-append.
    pub async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        reason: &str,
    ) -> Result<DebitOutcome, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "debit amount must be positive, got {}",
                amount
            )));
        }

        let outcome = self.store.debit(user_id, amount, reason).await?;
        match &outcome {
            DebitOutcome::Accepted { remaining } => {
                tracing::info!(
                    "Debit accepted: user_id={}, amount={}, remaining={}, reason={}",
                    user_id,
                    amount,
                    remaining,
                    reason
                );
            }
            DebitOutcome::InsufficientBalance { balance } => {
                tracing::info!(
                    "Debit rejected (insufficient balance): user_id={}, amount={}, balance={}",
                    user_id,
                    amount,
                    balance
                );
            }
        }
        Ok(outcome)
    }

    /// Grant credits idempotently. Replaying a previously seen
    /// `idempotency_key` returns `applied: false` and leaves the balance
    /// unchanged.
    pub async fn grant(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: &str,
        reason: &str,
    ) -> Result<GrantOutcome, LedgerError> {
        self.credit(user_id, amount, EntryKind::Grant, idempotency_key, reason)
            .await
    }

    /// Explicit refund. Never triggered automatically by a failed metered
    /// action; callers decide when a refund is warranted.
    pub async fn refund(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: &str,
        reason: &str,
    ) -> Result<GrantOutcome, LedgerError> {
        self.credit(user_id, amount, EntryKind::Refund, idempotency_key, reason)
            .await
    }

    /// Manual balance adjustment (operator action).
    pub async fn adjust(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: &str,
        reason: &str,
    ) -> Result<GrantOutcome, LedgerError> {
        self.credit(
            user_id,
            amount,
            EntryKind::Adjustment,
            idempotency_key,
            reason,
        )
        .await
    }

    async fn credit(
        &self,
        user_id: UserId,
        amount: i64,
        kind: EntryKind,
        idempotency_key: &str,
        reason: &str,
    ) -> Result<GrantOutcome, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "{} amount must be positive, got {}",
                kind, amount
            )));
        }
        if idempotency_key.is_empty() {
            return Err(LedgerError::InvalidAmount(
                "idempotency key must not be empty".to_string(),
            ));
        }

        let outcome = self
            .store
            .grant(user_id, amount, kind, idempotency_key, reason)
            .await
            .map_err(|e| {
                // A lost credit is a lost payment. Log loudly before propagating.
                tracing::error!(
                    "Storage failure applying {}: user_id={}, amount={}, idempotency_key={}, error={:#}",
                    kind,
                    user_id,
                    amount,
                    idempotency_key,
                    e
                );
                LedgerError::Storage(e.to_string())
            })?;

        if outcome.applied {
            tracing::info!(
                "{} applied: user_id={}, amount={}, balance={}, idempotency_key={}",
                kind,
                user_id,
                amount,
                outcome.balance,
                idempotency_key
            );
        } else {
            tracing::info!(
                "{} replayed (duplicate idempotency key, no-op): user_id={}, idempotency_key={}",
                kind,
                user_id,
                idempotency_key
            );
        }
        Ok(outcome)
    }

    pub async fn balance(&self, user_id: UserId) -> Result<i64, LedgerError> {
        Ok(self.store.balance(user_id).await?)
    }

    /// Paginated history, newest first. `limit` is clamped to
    /// [1, HISTORY_MAX_LIMIT].
    pub async fn history(
        &self,
        user_id: UserId,
        limit: i64,
        before: Option<i64>,
    ) -> Result<HistoryPage, LedgerError> {
        let limit = limit.clamp(1, HISTORY_MAX_LIMIT);
        Ok(self.store.history(user_id, limit, before).await?)
    }
}
