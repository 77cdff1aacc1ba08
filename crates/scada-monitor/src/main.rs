//! SCADA monitor - Entry Point
//!
//! Headless dashboard: keeps the process state in sync over push and
//! polling, logs the dashboard view and animates the P&ID diagram.

use anyhow::Result;
use clap::Parser;
use scada_monitor::config::DEFAULT_CONFIG_PATH;
use tracing::info;

/// SCADA real-time monitor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SCADA_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Backend base URL, overriding the configured one
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any https/wss connection
    scada_transport::init_crypto();

    let args = Args::parse();

    let logging = scada_telemetry::init_logging()?;

    info!(
        format = ?logging.format,
        filter = %logging.filter,
        "Starting SCADA monitor v{}",
        env!("CARGO_PKG_VERSION")
    );

    // CLI arg > SCADA_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SCADA_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!(config_path = %config_path, "Loading configuration");

    let mut config = scada_monitor::AppConfig::load(&config_path)?;
    if let Some(base_url) = args.base_url {
        config.server.base_url = base_url;
    }
    info!(base_url = %config.server.base_url, "Configuration loaded");

    let app = scada_monitor::Application::new(config)?;
    app.run().await?;

    Ok(())
}
