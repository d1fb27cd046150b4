use anyhow::Context;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, StoreBackend};
use crate::database::DatabaseManager;

/// Apply the embedded migrations to the configured Postgres database
pub async fn migrate(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.database.backend != StoreBackend::Postgres {
        anyhow::bail!("migrate requires DATABASE_BACKEND=postgres");
    }
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    let result = DatabaseManager::migrate(&pool).await;
    DatabaseManager::close(&pool).await;
    result.context("migration failed")?;
    output_success(output_format, "Migrations applied", None)
}
