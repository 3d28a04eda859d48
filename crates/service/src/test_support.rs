//! Shared fixtures for the test suites.
//!
//! Database tests run against an in-memory sqlite with the pool pinned to a
//! single connection: each pooled sqlite `:memory:` connection is its own
//! database, so more than one connection would split the schema from the
//! data.

use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;

use configs::DatabaseConfig;

use crate::store::SeaOrmStore;

pub async fn sqlite_db() -> anyhow::Result<DatabaseConnection> {
    let cfg = DatabaseConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        min_connections: 1,
        acquire_timeout_secs: 5,
        sqlx_logging: false,
    };
    let db = models::db::connect_with_config(&cfg).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn sqlite_store() -> anyhow::Result<SeaOrmStore> {
    Ok(SeaOrmStore::new(sqlite_db().await?))
}
