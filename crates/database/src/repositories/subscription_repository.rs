//! PostgreSQL implementation of the subscription store.

use crate::pool::DbPool;
use async_trait::async_trait;
use services::subscription::ports::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};
use services::UserId;

pub struct PostgresSubscriptionRepository {
    pool: DbPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &tokio_postgres::Row) -> anyhow::Result<SubscriptionRecord> {
    let status: String = row.get("status");
    Ok(SubscriptionRecord {
        provider_subscription_id: row.get("provider_subscription_id"),
        user_id: row.get("user_id"),
        provider_customer_id: row.get("provider_customer_id"),
        plan: row.get("plan"),
        status: status
            .parse::<SubscriptionStatus>()
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionRepository {
    async fn upsert(&self, record: SubscriptionRecord) -> anyhow::Result<SubscriptionRecord> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO subscriptions
                     (provider_subscription_id, user_id, provider_customer_id, plan, status,
                      current_period_start, current_period_end, cancel_at_period_end)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (provider_subscription_id)
                 DO UPDATE SET user_id = EXCLUDED.user_id,
                               provider_customer_id = EXCLUDED.provider_customer_id,
                               plan = EXCLUDED.plan,
                               status = EXCLUDED.status,
                               current_period_start = EXCLUDED.current_period_start,
                               current_period_end = EXCLUDED.current_period_end,
                               cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                               updated_at = NOW()
                 RETURNING provider_subscription_id, user_id, provider_customer_id, plan, status,
                           current_period_start, current_period_end, cancel_at_period_end,
                           created_at, updated_at",
                &[
                    &record.provider_subscription_id,
                    &record.user_id,
                    &record.provider_customer_id,
                    &record.plan,
                    &record.status.as_str(),
                    &record.current_period_start,
                    &record.current_period_end,
                    &record.cancel_at_period_end,
                ],
            )
            .await?;
        row_to_record(&row)
    }

    async fn get(
        &self,
        provider_subscription_id: &str,
    ) -> anyhow::Result<Option<SubscriptionRecord>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT provider_subscription_id, user_id, provider_customer_id, plan, status,
                        current_period_start, current_period_end, cancel_at_period_end,
                        created_at, updated_at
                 FROM subscriptions WHERE provider_subscription_id = $1",
                &[&provider_subscription_id],
            )
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_active_for_user(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<SubscriptionRecord>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT provider_subscription_id, user_id, provider_customer_id, plan, status,
                        current_period_start, current_period_end, cancel_at_period_end,
                        created_at, updated_at
                 FROM subscriptions
                 WHERE user_id = $1 AND status = 'active'
                 ORDER BY updated_at DESC
                 LIMIT 1",
                &[&user_id],
            )
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn set_status(
        &self,
        provider_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE subscriptions SET status = $2, updated_at = NOW()
                 WHERE provider_subscription_id = $1",
                &[&provider_subscription_id, &status.as_str()],
            )
            .await?;
        Ok(updated == 1)
    }
}
