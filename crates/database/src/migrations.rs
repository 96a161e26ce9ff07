//! Schema migrations, applied idempotently at startup.

use crate::pool::DbPool;
use anyhow::Result;
use tracing::info;

pub async fn run(pool: &DbPool) -> Result<()> {
    let client = pool.get().await?;

    info!("Running database migrations");

    client
        .batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS account_balances (
                user_id UUID PRIMARY KEY,
                balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS ledger_entries (
                seq BIGSERIAL PRIMARY KEY,
                id UUID NOT NULL UNIQUE,
                user_id UUID NOT NULL,
                kind TEXT NOT NULL,
                amount BIGINT NOT NULL,
                reason TEXT NOT NULL,
                idempotency_key TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_entries_idempotency_key
                ON ledger_entries (idempotency_key)
                WHERE idempotency_key IS NOT NULL;

            CREATE INDEX IF NOT EXISTS idx_ledger_entries_user_seq
                ON ledger_entries (user_id, seq DESC);

            CREATE TABLE IF NOT EXISTS payment_intents (
                order_id TEXT PRIMARY KEY,
                user_id UUID NOT NULL,
                plan_id TEXT NOT NULL,
                expected_amount BIGINT NOT NULL,
                currency TEXT NOT NULL,
                credits_to_grant BIGINT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS idx_payment_intents_user
                ON payment_intents (user_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS subscriptions (
                provider_subscription_id TEXT PRIMARY KEY,
                user_id UUID NOT NULL,
                provider_customer_id TEXT NOT NULL,
                plan TEXT NOT NULL,
                status TEXT NOT NULL,
                current_period_start TIMESTAMPTZ NOT NULL,
                current_period_end TIMESTAMPTZ NOT NULL,
                cancel_at_period_end BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS idx_subscriptions_user
                ON subscriptions (user_id, updated_at DESC);
            "#,
        )
        .await?;

    info!("Database migrations complete");
    Ok(())
}
