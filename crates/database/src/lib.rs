pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};

use anyhow::Result;
use std::sync::Arc;

use repositories::{
    PostgresLedgerRepository, PostgresPaymentIntentRepository, PostgresSubscriptionRepository,
};

/// Database service combining all repositories
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new database service from configuration
    pub fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config)?;
        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn ledger_repository(&self) -> Arc<PostgresLedgerRepository> {
        Arc::new(PostgresLedgerRepository::new(self.pool.clone()))
    }

    pub fn payment_intent_repository(&self) -> Arc<PostgresPaymentIntentRepository> {
        Arc::new(PostgresPaymentIntentRepository::new(self.pool.clone()))
    }

    pub fn subscription_repository(&self) -> Arc<PostgresSubscriptionRepository> {
        Arc::new(PostgresSubscriptionRepository::new(self.pool.clone()))
    }
}
