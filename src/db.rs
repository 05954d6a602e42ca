//! Database pool and schema migrations.

use std::time::Duration;

use migrations::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Alias kept at the seams so the pool type appears in one place.
pub type DbPool = DatabaseConnection;

/// Opens the connection pool described by the configuration.
pub async fn establish_connection(config: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    info!(
        max_connections = config.db_max_connections,
        "connecting to database"
    );
    let pool = Database::connect(opt).await?;
    Ok(pool)
}

/// Applies every pending migration. Safe to run on every startup.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    Migrator::up(pool, None).await?;
    info!("database schema is up to date");
    Ok(())
}
