/**
 * CONTENT SERVER - weather station producer
 *
 * Usage: content-server <server> <file> [--interval 15s]
 *
 * Without --interval the station is uploaded once and the process exits with
 * the upload result. With --interval it keeps re-uploading so the aggregator
 * never expires the station, until Ctrl-C.
 */

use anyhow::{Context, Result};
use clap::Parser;
use content_server::{load_station, RetryPolicy, Uploader};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Uploads a weather station file to the aggregation server.
#[derive(Parser)]
#[command(name = "content-server", version, about)]
struct Cli {
    /// Aggregator address: host:port, http://host:port or a full URL.
    server: String,

    /// Station file: `key: value` lines or a JSON object, with an `id`.
    file: PathBuf,

    /// Extra attempts on connection errors and 5xx answers.
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Pause between attempts.
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    retry_delay: Duration,

    /// Re-upload the station file at this period instead of exiting.
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Logging filter.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt().with_env_filter(filter).with_target(false).init();

    let policy = RetryPolicy {
        retries: cli.retries,
        delay: cli.retry_delay,
    };
    let uploader = Uploader::new(&cli.server, policy).context("building HTTP client")?;
    info!(endpoint = uploader.endpoint(), file = %cli.file.display(), "[content-server] starting");

    let Some(period) = cli.interval else {
        let station = load_station(&cli.file)
            .await
            .with_context(|| format!("loading {}", cli.file.display()))?;
        let receipt = uploader.upload(&station).await?;
        println!("{} (Lamport-Clock: {})", receipt.status, uploader.clock().value());
        return Ok(());
    };

    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("[content-server] stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                // The file is re-read so edits are picked up without a restart.
                match load_station(&cli.file).await {
                    Ok(station) => {
                        if let Err(e) = uploader.upload(&station).await {
                            error!("[content-server] upload failed: {}", e);
                        }
                    }
                    Err(e) => error!("[content-server] {}", e),
                }
            }
        }
    }
}
