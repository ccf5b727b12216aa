/*!
Test harness for the aggregator

Starts a real aggregator (recovery, sweeper, HTTP adapter) on 127.0.0.1
with an ephemeral port and a scratch data dir, and talks to it over HTTP.
*/

use anyhow::{Context, Result};
use reqwest::{Client, Method, Response};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use weather_aggregator::config::AggregatorConfig;
use weather_aggregator::Aggregator;
use weather_protocol::payload::{self, Attributes};
use weather_protocol::{parse_clock, LAMPORT_CLOCK_HEADER, WEATHER_PATH};

pub struct TestHarness {
    data_dir: TempDir,
    config: AggregatorConfig,
    addr: SocketAddr,
    shutdown: CancellationToken,
    server: JoinHandle<Result<()>>,
    http: Client,
}

impl TestHarness {
    /// Aggregator with default settings.
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Aggregator with settings adjusted by `tweak`. `data_dir` is always
    /// the harness scratch dir.
    pub async fn start_with<F>(tweak: F) -> Result<Self>
    where
        F: FnOnce(&mut AggregatorConfig),
    {
        let data_dir = tempfile::tempdir().context("creating scratch data dir")?;
        let mut config = AggregatorConfig::default();
        tweak(&mut config);
        Self::launch(data_dir, config).await
    }

    async fn launch(data_dir: TempDir, mut config: AggregatorConfig) -> Result<Self> {
        init_tracing();
        config.data_dir = data_dir.path().to_path_buf();

        let aggregator = Aggregator::bootstrap(config.clone())?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        config.port = addr.port();

        let shutdown = CancellationToken::new();
        let server = tokio::spawn(aggregator.serve(listener, shutdown.clone()));
        tracing::info!(%addr, "test aggregator started");

        Ok(Self {
            data_dir,
            config,
            addr,
            shutdown,
            server,
            http: Client::builder().timeout(Duration::from_secs(10)).build()?,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `host:port`, the form the clients take on their command line.
    pub fn server(&self) -> String {
        self.addr.to_string()
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, WEATHER_PATH)
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// PUT with a raw body and an optional raw `Lamport-Clock` header.
    pub async fn put_raw(&self, body: impl Into<Vec<u8>>, clock: Option<&str>) -> Result<Response> {
        let mut request = self
            .http
            .put(self.url())
            .header("content-type", "application/json")
            .body(body.into());
        if let Some(clock) = clock {
            request = request.header(LAMPORT_CLOCK_HEADER, clock);
        }
        Ok(request.send().await?)
    }

    pub async fn put_station(&self, station: &Attributes) -> Result<Response> {
        self.put_raw(payload::encode_reading(station), None).await
    }

    pub async fn get(&self) -> Result<Response> {
        Ok(self.http.get(self.url()).send().await?)
    }

    /// GET and decode the readings; fails on a non-200 answer.
    pub async fn readings(&self) -> Result<Vec<Attributes>> {
        let response = self.get().await?;
        anyhow::ensure!(response.status().is_success(), "GET failed: {}", response.status());
        Ok(payload::decode_snapshot(&response.bytes().await?)?)
    }

    pub async fn request(&self, method: Method) -> Result<Response> {
        Ok(self.http.request(method, self.url()).send().await?)
    }

    /// Stops the server and hands back the data dir.
    pub async fn stop(self) -> Result<(TempDir, AggregatorConfig)> {
        self.shutdown.cancel();
        self.server.await.context("aggregator task panicked")??;
        Ok((self.data_dir, self.config))
    }

    /// Stops the server and boots a fresh one on the same data dir.
    pub async fn restart(self) -> Result<Self> {
        let (data_dir, config) = self.stop().await?;
        Self::launch(data_dir, config).await
    }
}

/// `Lamport-Clock` value of a response.
pub fn clock_of(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(LAMPORT_CLOCK_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_clock)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
