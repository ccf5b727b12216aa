/**
 * WEATHER AGGREGATOR - server entry point
 *
 * Loads .env and the YAML config, applies CLI overrides, recovers the last
 * snapshot and serves until SIGINT/SIGTERM.
 */

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};
use weather_aggregator::config::{config_path, load_config};
use weather_aggregator::Aggregator;

/// Aggregation server keeping the freshest reading of each weather station.
#[derive(Parser)]
#[command(name = "weather-aggregator", version, about)]
struct Cli {
    /// Listening port, overrides the config file.
    port: Option<u16>,

    /// Path to the YAML configuration file.
    #[arg(short, long, env = "WEATHER_AGGREGATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the snapshot file, overrides the config file.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Logging filter (trace, debug, info, warn, error or an EnvFilter directive).
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt().with_env_filter(filter).with_target(true).init();

    let mut cfg = load_config(&config_path(cli.config)).await;
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        cfg.data_dir = data_dir;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.port,
        data_dir = %cfg.data_dir.display(),
        "starting weather-aggregator"
    );

    let aggregator = Aggregator::bootstrap(cfg)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    aggregator.run(shutdown).await
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
    }
    shutdown.cancel();
}
