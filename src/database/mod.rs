use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
pub mod transaction;
pub mod utils;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Store, StoreTx, TransactionFilter};

pub async fn init_database(database_url: &str, max_connections: u32) -> Result<PgPool> {
    // Create connection pool
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    // Run migrations
    log::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Migrations completed successfully");

    Ok(pool)
}
