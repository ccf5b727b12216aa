use anyhow::{Context, Result};
use clap::Parser;
use get_client::{filter_station, render, QueryClient};
use tracing_subscriber::{fmt, EnvFilter};

/// Prints the latest weather readings held by the aggregator.
#[derive(Parser)]
#[command(name = "get-client", version, about)]
struct Cli {
    /// Aggregator address: host:port, http://host:port or a full URL.
    server: String,

    /// Only show this station.
    station_id: Option<String>,

    /// Logging filter.
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let client = QueryClient::new(&cli.server).context("building HTTP client")?;
    let readings = client
        .fetch()
        .await
        .with_context(|| format!("querying {}", client.endpoint()))?;

    let readings = filter_station(readings, cli.station_id.as_deref());
    print!("{}", render(&readings));
    tracing::debug!(clock = client.clock().value(), "[get-client] done");
    Ok(())
}
