use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use configs::DatabaseConfig;

/// Open a pool from validated configuration. The URL and its env fallback
/// are resolved by the configs crate before this is called.
pub async fn connect_with_config(cfg: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(cfg.url.clone());
    opts.max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .sqlx_logging(cfg.sqlx_logging);
    let db = Database::connect(opts).await?;
    Ok(db)
}
