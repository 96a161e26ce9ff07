use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

/// Connection pool type alias
pub type DbPool = Pool;

/// Create a connection pool from database configuration.
pub fn create_pool(db_config: &config::DatabaseConfig) -> anyhow::Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(db_config.host.clone());
    cfg.port = Some(db_config.port);
    cfg.dbname = Some(db_config.database.clone());
    cfg.user = Some(db_config.username.clone());
    cfg.password = Some(db_config.password.clone());
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(
        db_config.max_connections as usize,
    ));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    info!(
        "Creating database pool: host={}, port={}, database={}, max_connections={}",
        db_config.host, db_config.port, db_config.database, db_config.max_connections
    );

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))
}
