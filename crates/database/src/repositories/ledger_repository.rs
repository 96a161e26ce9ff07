//! PostgreSQL implementation of the credit ledger store.

use crate::pool::DbPool;
use async_trait::async_trait;
use services::ledger::ports::{
    DebitOutcome, EntryKind, GrantOutcome, HistoryPage, LedgerEntry, LedgerStore,
};
use services::UserId;
use uuid::Uuid;

pub struct PostgresLedgerRepository {
    pool: DbPool,
}

impl PostgresLedgerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &tokio_postgres::Row) -> anyhow::Result<LedgerEntry> {
    let kind: String = row.get("kind");
    Ok(LedgerEntry {
        id: row.get("id"),
        seq: row.get("seq"),
        user_id: row.get("user_id"),
        kind: kind
            .parse::<EntryKind>()
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        amount: row.get("amount"),
        reason: row.get("reason"),
        idempotency_key: row
            .get::<_, Option<String>>("idempotency_key")
            .unwrap_or_default(),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl LedgerStore for PostgresLedgerRepository {
    async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        reason: &str,
    ) -> anyhow::Result<DebitOutcome> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        // Row lock serializes concurrent debits for the same user.
        let row = txn
            .query_opt(
                "SELECT balance FROM account_balances WHERE user_id = $1 FOR UPDATE",
                &[&user_id],
            )
            .await?;
        let balance = row.map(|r| r.get::<_, i64>("balance")).unwrap_or(0);

        if balance < amount {
            txn.rollback().await?;
            return Ok(DebitOutcome::InsufficientBalance { balance });
        }

        let remaining = balance - amount;
        txn.execute(
            "UPDATE account_balances SET balance = $2, updated_at = NOW() WHERE user_id = $1",
            &[&user_id, &remaining],
        )
        .await?;

        txn.execute(
            "INSERT INTO ledger_entries (id, user_id, kind, amount, reason, idempotency_key)
             VALUES ($1, $2, 'debit', $3, $4, NULL)",
            &[&Uuid::new_v4(), &user_id, &(-amount), &reason],
        )
        .await?;

        txn.commit().await?;
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
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        // The partial unique index on idempotency_key makes the insert the
        // idempotency gate: a replay inserts nothing.
        let inserted = txn
            .query_opt(
                "INSERT INTO ledger_entries (id, user_id, kind, amount, reason, idempotency_key)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (idempotency_key) WHERE idempotency_key IS NOT NULL DO NOTHING
                 RETURNING seq",
                &[
                    &Uuid::new_v4(),
                    &user_id,
                    &kind.as_str(),
                    &amount,
                    &reason,
                    &idempotency_key,
                ],
            )
            .await?;

        if inserted.is_none() {
            let row = txn
                .query_opt(
                    "SELECT balance FROM account_balances WHERE user_id = $1",
                    &[&user_id],
                )
                .await?;
            txn.commit().await?;
            return Ok(GrantOutcome {
                applied: false,
                balance: row.map(|r| r.get::<_, i64>("balance")).unwrap_or(0),
            });
        }

        let row = txn
            .query_one(
                "INSERT INTO account_balances (user_id, balance)
                 VALUES ($1, $2)
                 ON CONFLICT (user_id)
                 DO UPDATE SET balance = account_balances.balance + EXCLUDED.balance,
                               updated_at = NOW()
                 RETURNING balance",
                &[&user_id, &amount],
            )
            .await?;
        let balance = row.get::<_, i64>("balance");

        txn.commit().await?;
        Ok(GrantOutcome {
            applied: true,
            balance,
        })
    }

    async fn balance(&self, user_id: UserId) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT balance FROM account_balances WHERE user_id = $1",
                &[&user_id],
            )
            .await?;
        Ok(row.map(|r| r.get::<_, i64>("balance")).unwrap_or(0))
    }

    async fn history(
        &self,
        user_id: UserId,
        limit: i64,
        before: Option<i64>,
    ) -> anyhow::Result<HistoryPage> {
        let client = self.pool.get().await?;

        // Fetch one extra row to detect whether another page exists.
        let rows = match before {
            Some(before) => {
                client
                    .query(
                        "SELECT seq, id, user_id, kind, amount, reason, idempotency_key, created_at
                         FROM ledger_entries
                         WHERE user_id = $1 AND seq < $2
                         ORDER BY seq DESC
                         LIMIT $3",
                        &[&user_id, &before, &(limit + 1)],
                    )
                    .await?
            }
            None => {
                client
                    .query(
                        "SELECT seq, id, user_id, kind, amount, reason, idempotency_key, created_at
                         FROM ledger_entries
                         WHERE user_id = $1
                         ORDER BY seq DESC
                         LIMIT $2",
                        &[&user_id, &(limit + 1)],
                    )
                    .await?
            }
        };

        let has_more = rows.len() as i64 > limit;
        let mut entries = Vec::with_capacity(rows.len().min(limit as usize));
        for row in rows.iter().take(limit as usize) {
            entries.push(row_to_entry(row)?);
        }
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
