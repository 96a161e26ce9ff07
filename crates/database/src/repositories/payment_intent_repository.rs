//! PostgreSQL implementation of the payment intent store.

use crate::pool::DbPool;
use async_trait::async_trait;
use services::payment::ports::{
    CompletionOutcome, FailOutcome, IntentStatus, NewPaymentIntent, PaymentIntent,
    PaymentIntentStore,
};
use services::UserId;
use uuid::Uuid;

pub struct PostgresPaymentIntentRepository {
    pool: DbPool,
}

impl PostgresPaymentIntentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_intent(row: &tokio_postgres::Row) -> anyhow::Result<PaymentIntent> {
    let status: String = row.get("status");
    Ok(PaymentIntent {
        order_id: row.get("order_id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        expected_amount: row.get("expected_amount"),
        currency: row.get("currency"),
        credits_to_grant: row.get("credits_to_grant"),
        status: status
            .parse::<IntentStatus>()
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl PaymentIntentStore for PostgresPaymentIntentRepository {
    async fn create_intent(&self, intent: NewPaymentIntent) -> anyhow::Result<PaymentIntent> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO payment_intents
                     (order_id, user_id, plan_id, expected_amount, currency, credits_to_grant)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING order_id, user_id, plan_id, expected_amount, currency,
                           credits_to_grant, status, created_at, updated_at",
                &[
                    &intent.order_id,
                    &intent.user_id,
                    &intent.plan_id,
                    &intent.expected_amount,
                    &intent.currency,
                    &intent.credits_to_grant,
                ],
            )
            .await?;
        row_to_intent(&row)
    }

    async fn get_intent(&self, order_id: &str) -> anyhow::Result<Option<PaymentIntent>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT order_id, user_id, plan_id, expected_amount, currency,
                        credits_to_grant, status, created_at, updated_at
                 FROM payment_intents WHERE order_id = $1",
                &[&order_id],
            )
            .await?;
        row.as_ref().map(row_to_intent).transpose()
    }

    async fn complete_and_grant(&self, order_id: &str) -> anyhow::Result<CompletionOutcome> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        // Lock the intent row so a concurrent redelivery waits and then
        // sees the terminal status.
        let row = txn
            .query_opt(
                "SELECT order_id, user_id, plan_id, expected_amount, currency,
                        credits_to_grant, status, created_at, updated_at
                 FROM payment_intents WHERE order_id = $1 FOR UPDATE",
                &[&order_id],
            )
            .await?;

        let Some(row) = row else {
            txn.rollback().await?;
            return Ok(CompletionOutcome::NotFound);
        };
        let intent = row_to_intent(&row)?;

        if intent.status.is_terminal() {
            txn.rollback().await?;
            return Ok(CompletionOutcome::AlreadyTerminal(intent.status));
        }

        // The grant rides in the same transaction as the status change.
        // The order id doubles as the ledger idempotency key.
        let reason = format!("purchase:{}", intent.plan_id);
        txn.execute(
            "INSERT INTO ledger_entries (id, user_id, kind, amount, reason, idempotency_key)
             VALUES ($1, $2, 'grant', $3, $4, $5)
             ON CONFLICT (idempotency_key) WHERE idempotency_key IS NOT NULL DO NOTHING",
            &[
                &Uuid::new_v4(),
                &intent.user_id,
                &intent.credits_to_grant,
                &reason,
                &order_id,
            ],
        )
        .await?;

        let row = txn
            .query_one(
                "INSERT INTO account_balances (user_id, balance)
                 VALUES ($1, $2)
                 ON CONFLICT (user_id)
                 DO UPDATE SET balance = account_balances.balance + EXCLUDED.balance,
                               updated_at = NOW()
                 RETURNING balance",
                &[&intent.user_id, &intent.credits_to_grant],
            )
            .await?;
        let balance = row.get::<_, i64>("balance");

        txn.execute(
            "UPDATE payment_intents SET status = 'completed', updated_at = NOW()
             WHERE order_id = $1",
            &[&order_id],
        )
        .await?;

        txn.commit().await?;
        Ok(CompletionOutcome::Completed { balance })
    }

    async fn mark_failed(&self, order_id: &str) -> anyhow::Result<FailOutcome> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        let row = txn
            .query_opt(
                "SELECT status FROM payment_intents WHERE order_id = $1 FOR UPDATE",
                &[&order_id],
            )
            .await?;

        let Some(row) = row else {
            txn.rollback().await?;
            return Ok(FailOutcome::NotFound);
        };
        let status: String = row.get("status");
        let status = status
            .parse::<IntentStatus>()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        if status.is_terminal() {
            txn.rollback().await?;
            return Ok(FailOutcome::AlreadyTerminal(status));
        }

        txn.execute(
            "UPDATE payment_intents SET status = 'failed', updated_at = NOW()
             WHERE order_id = $1",
            &[&order_id],
        )
        .await?;

        txn.commit().await?;
        Ok(FailOutcome::Failed)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> anyhow::Result<Vec<PaymentIntent>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT order_id, user_id, plan_id, expected_amount, currency,
                        credits_to_grant, status, created_at, updated_at
                 FROM payment_intents
                 WHERE user_id = $1
                 ORDER BY created_at DESC
                 LIMIT $2",
                &[&user_id, &limit],
            )
            .await?;
        rows.iter().map(row_to_intent).collect()
    }
}
