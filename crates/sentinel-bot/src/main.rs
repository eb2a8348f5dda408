//! Sentinel execution gate - Entry Point
//!
//! Reads trading signals as JSON lines on stdin and runs each through the
//! gating, sizing, scoring and routing pipeline against paper collaborators.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Sentinel execution gate
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SENTINEL_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CLI arg > SENTINEL_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SENTINEL_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = sentinel_bot::AppConfig::from_file(&config_path)?;

    sentinel_telemetry::init_logging(&config.telemetry.log_level)?;
    info!("Starting sentinel-bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = %config_path,
        fixture = %config.paper.fixture.display(),
        metrics_port = config.telemetry.metrics_port,
        "Configuration loaded"
    );

    let app = sentinel_bot::Application::new(config)?;
    let summary = app.run().await?;
    info!(?summary, "Run complete");

    Ok(())
}
