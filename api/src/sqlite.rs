use std::str::FromStr;

use anyhow::Result;
use serde::Deserialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub url: String,
    pub max_connections: u32,
}

pub async fn create_pool(settings: &Settings) -> Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str(&settings.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(connect_options)
        .await?;
    tracing::info!("Connected to {}", settings.url);

    sqlx::migrate!("db/migrations").run(&pool).await?;
    tracing::info!("Migrations complete");

    Ok(pool)
}
