use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("unknown subscription status: {}", other)),
        }
    }
}

/// Local mirror of one provider-side subscription. The provider is the
/// source of truth; this record converges toward whatever the most recent
/// webhook reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SubscriptionRecord {
    pub provider_subscription_id: String,
    pub user_id: UserId,
    pub provider_customer_id: String,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage port for subscription state. Upserts are keyed by the
/// provider's subscription id so re-delivered events converge.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or overwrite the record for its provider subscription id.
    async fn upsert(&self, record: SubscriptionRecord) -> anyhow::Result<SubscriptionRecord>;

    async fn get(&self, provider_subscription_id: &str)
        -> anyhow::Result<Option<SubscriptionRecord>>;

    /// Most recently updated active subscription for a user, if any.
    async fn get_active_for_user(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<SubscriptionRecord>>;

    /// Update just the status. Returns false when no record exists for
    /// the id; callers must not create one as a side effect.
    async fn set_status(
        &self,
        provider_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> anyhow::Result<bool>;
}
