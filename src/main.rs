use std::sync::Arc;

use anyhow::Result;

use paytrack::database::{PgStore, init_database};
use paytrack::services::SystemClock;
use paytrack::{AppError, Config, Engine};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init();

    let config = Config::from_env()?;
    log::info!("Configuration loaded (environment: {})", config.environment);

    let pool = init_database(&config.database_url, config.max_connections).await?;
    log::info!("Database initialized");

    let engine = Engine::from_config(PgStore::new(pool), Arc::new(SystemClock), &config)?;
    let scope = config.reconcile_scope()?;

    match engine.reconciliation.run(scope).await {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(AppError::AlreadyProcessed) => {
            log::info!("Reconciliation for {} already ran today, nothing to do", scope);
            Ok(())
        }
        Err(err) => Err(anyhow::anyhow!("Reconciliation failed: {}", err)),
    }
}
