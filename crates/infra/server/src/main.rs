//! Gym Access Server binary.
//!
//! Usage: `gym-access-server [config.toml]`. The path may also come from
//! `GYM_ACCESS_CONFIG`; without either the defaults are used.

use gym_access_server::{load_config, AccessServer, AppConfig};

const CONFIG_ENV: &str = "GYM_ACCESS_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let path = std::env::args().nth(1).or_else(|| std::env::var(CONFIG_ENV).ok());
    let config = match &path {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    // Initialize tracing
    tracing_subscriber::fmt().with_max_level(config.server.level()?).init();
    match &path {
        Some(path) => tracing::info!(path = %path, "Loaded configuration"),
        None => tracing::info!("No configuration file given, using defaults"),
    }

    // Create and run server
    let server = AccessServer::in_memory(config);
    server.run().await?;

    Ok(())
}
