use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::UserId;

/// Kind of a balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub enum EntryKind {
    Debit,
    Grant,
    Refund,
    Adjustment,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Grant => "grant",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(Self::Debit),
            "grant" => Ok(Self::Grant),
            "refund" => Ok(Self::Refund),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(format!("unknown ledger entry kind: {}", other)),
        }
    }
}

/// Immutable record of a single balance-affecting event.
/// Entries are append-only; nothing ever mutates or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct LedgerEntry {
    pub id: Uuid,
    /// Monotonic position within the ledger, used as the history cursor.
    pub seq: i64,
    pub user_id: UserId,
    pub kind: EntryKind,
    /// Signed amount: negative for debits, positive for grants/refunds.
    pub amount: i64,
    pub reason: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a debit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Accepted { remaining: i64 },
    /// The balance could not cover the amount; nothing was changed.
    InsufficientBalance { balance: i64 },
}

/// Result of a grant. `applied` is false when the idempotency key was
/// already seen and the balance was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantOutcome {
    pub applied: bool,
    pub balance: i64,
}

/// One page of ledger history, newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub entries: Vec<LedgerEntry>,
    /// Cursor for the next page; None when exhausted.
    pub next_before: Option<i64>,
}

/// Storage port for the credit ledger. Implementations must make each
/// operation atomic per user: a debit's read-compare-write-append and a
/// grant's key-check-write-append are single indivisible units.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomically decrement the balance and append a Debit entry, or
    /// report the current balance when it cannot cover `amount`.
    async fn debit(&self, user_id: UserId, amount: i64, reason: &str)
        -> anyhow::Result<DebitOutcome>;

    /// Atomically increment the balance and append an entry of `kind`,
    /// unless `idempotency_key` was already recorded.
    async fn grant(
        &self,
        user_id: UserId,
        amount: i64,
        kind: EntryKind,
        idempotency_key: &str,
        reason: &str,
    ) -> anyhow::Result<GrantOutcome>;

    /// Point-in-time balance read; 0 for users with no ledger activity.
    async fn balance(&self, user_id: UserId) -> anyhow::Result<i64>;

    /// Ledger entries for a user, newest first. `before` restarts the
    /// scan strictly below a previously returned cursor.
    async fn history(
        &self,
        user_id: UserId,
        limit: i64,
        before: Option<i64>,
    ) -> anyhow::Result<HistoryPage>;
}

/// Error types for ledger operations.
#[derive(Debug)]
pub enum LedgerError {
    /// Amount was zero or negative.
    InvalidAmount(String),
    /// Storage failure. Surfaced loudly on grant paths: an accepted
    /// payment with no corresponding credit must never be silent.
    Storage(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
