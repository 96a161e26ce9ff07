use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub enum IntentStatus {
    Pending,
    Completed,
    Failed,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and Failed are terminal; only Pending intents accept
    /// transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment intent status: {}", other)),
        }
    }
}

/// A checkout awaiting (or having received) its provider notification.
/// The expected amount and currency recorded here are what incoming
/// notifications are validated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PaymentIntent {
    pub order_id: String,
    pub user_id: UserId,
    pub plan_id: String,
    /// Expected charge in the currency's minor unit.
    pub expected_amount: i64,
    pub currency: String,
    pub credits_to_grant: i64,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a pending intent at checkout time.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub order_id: String,
    pub user_id: UserId,
    pub plan_id: String,
    pub expected_amount: i64,
    pub currency: String,
    pub credits_to_grant: i64,
}

/// Result of attempting to complete an intent and grant its credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The intent transitioned to Completed and the grant was applied.
    Completed { balance: i64 },
    /// The intent was already terminal; nothing changed.
    AlreadyTerminal(IntentStatus),
    NotFound,
}

/// Result of attempting to mark an intent failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    Failed,
    AlreadyTerminal(IntentStatus),
    NotFound,
}

/// Storage port for payment intents. `complete_and_grant` is the critical
/// operation: the terminal-status check, the credit grant, and the status
/// transition must commit or abort as one unit so a notification can never
/// grant twice or grant without completing.
#[async_trait]
pub trait PaymentIntentStore: Send + Sync {
    async fn create_intent(&self, intent: NewPaymentIntent) -> anyhow::Result<PaymentIntent>;

    async fn get_intent(&self, order_id: &str) -> anyhow::Result<Option<PaymentIntent>>;

    /// Atomically re-check the intent is still Pending, grant its credits
    /// (idempotency key = order id), and transition it to Completed.
    async fn complete_and_grant(&self, order_id: &str) -> anyhow::Result<CompletionOutcome>;

    /// Transition a Pending intent to Failed. Terminal intents are left
    /// untouched.
    async fn mark_failed(&self, order_id: &str) -> anyhow::Result<FailOutcome>;

    /// Intents for a user, newest first.
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> anyhow::Result<Vec<PaymentIntent>>;
}
