//! tpwatch - Position lifecycle monitor entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Position lifecycle monitor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TPWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tpwatch_telemetry::init_logging()?;

    info!("Starting tpwatch v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > TPWATCH_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TPWATCH_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = tpwatch_bot::AppConfig::from_file(&config_path)?;
    info!(
        interval_secs = config.monitor.interval_secs,
        feed = %config.feed.base_url,
        watch = config.watch.len(),
        "Configuration loaded"
    );

    let app = tpwatch_bot::Application::new(config)?;
    app.seed_watch_list();
    app.run().await?;

    Ok(())
}
