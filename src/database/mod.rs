use anyhow::Result;
use sqlx::{PgPool, Postgres, migrate::MigrateDatabase, postgres::PgPoolOptions};

pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;
pub mod transaction;
pub mod utils;

pub use memory::InMemoryStore;
pub use store::{MemberStore, NotificationStore, ReminderStore, RsvpStore, SessionStore};

pub async fn init_database(database_url: &str) -> Result<PgPool> {
    // Create database if it doesn't exist
    if !Postgres::database_exists(database_url).await.unwrap_or(false) {
        log::info!("Creating database");
        Postgres::create_database(database_url).await?;
        log::info!("Database created successfully");
    } else {
        log::debug!("Database already exists");
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    log::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Migrations completed successfully");

    Ok(pool)
}
