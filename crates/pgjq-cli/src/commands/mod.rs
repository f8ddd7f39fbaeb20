//! CLI command implementations.

pub mod jobs;
pub mod metrics;
pub mod queues;
pub mod reap;

use anyhow::{Context, Result};
use pgjq_config::{PgjqConfig, load_config, validate_database_url};
use pgjq_engine::Pgjq;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Read the configuration file, if any, and apply command line overrides.
pub fn load(path: Option<&Path>, database_url: Option<String>) -> Result<PgjqConfig> {
    let mut config = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => PgjqConfig::default(),
    };
    if let Some(url) = database_url {
        validate_database_url("database-url", &url)?;
        config.database.url = Some(url);
    }
    Ok(config)
}

pub async fn connect(config: &PgjqConfig) -> Result<Pgjq> {
    let pgjq = Pgjq::connect(config)
        .await
        .context("failed to connect to the job store")?;
    Ok(pgjq)
}

pub async fn migrate(config: &PgjqConfig) -> Result<()> {
    let url = config
        .database
        .url
        .as_deref()
        .context("no database url: pass --database-url or set database.url")?;
    let pool = pgjq_db::create_pool(url, &config.database).await?;
    pgjq_db::run_migrations(&pool).await?;
    info!("Migrations applied");
    println!("Migrations applied");
    Ok(())
}

pub fn validate(path: &Path) -> Result<()> {
    match load_config(path) {
        Ok(_config) => {
            println!("Configuration is valid");
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
