/**
 * WEATHER AGGREGATOR - freshest reading per station, Lamport-ordered
 *
 * BOOTSTRAP ORDER:
 * 1. persistence.recover()   staging leftovers discarded, snapshot loaded
 * 2. store.restore(..)       recovered readings keep their last contact
 * 3. clock starts at the largest recovered logical time
 * 4. sweeper spawned, then the listener starts accepting
 *
 * Nothing is served before recovery has finished.
 */

pub mod config;
pub mod coordinator;
pub mod http;
pub mod models;
pub mod persistence;
pub mod store;
pub mod sweeper;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use weather_protocol::LogicalClock;

use crate::config::AggregatorConfig;
use crate::coordinator::RequestCoordinator;
use crate::http::{build_router, AppState};
use crate::persistence::PersistenceManager;
use crate::store::ReadingStore;
use crate::sweeper::ExpirySweeper;

pub struct Aggregator {
    config: AggregatorConfig,
    store: Arc<ReadingStore>,
    coordinator: RequestCoordinator,
}

impl Aggregator {
    /// Recovers the last committed snapshot and wires the components.
    pub fn bootstrap(config: AggregatorConfig) -> Result<Self> {
        config.validate().context("invalid aggregator config")?;

        let persistence = Arc::new(
            PersistenceManager::new(&config.data_dir)
                .with_context(|| format!("preparing data dir {}", config.data_dir.display()))?,
        );
        let store = Arc::new(ReadingStore::new());

        let recovered = persistence.recover();
        let resume_at = recovered
            .iter()
            .map(|r| r.received_logical_time)
            .max()
            .unwrap_or(0);
        let count = recovered.len();
        for reading in recovered {
            store.restore(reading);
        }
        let clock = Arc::new(LogicalClock::starting_at(resume_at));
        info!(readings = count, clock = resume_at, "[aggregator] state recovered");

        let coordinator = RequestCoordinator::new(clock, store.clone(), persistence, config.snapshot_cap);
        Ok(Self {
            config,
            store,
            coordinator,
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    pub fn router(&self) -> axum::Router {
        build_router(AppState {
            coordinator: self.coordinator.clone(),
            body_timeout: self.config.body_timeout,
            max_body_bytes: self.config.max_body_bytes,
        })
    }

    /// Binds `0.0.0.0:<port>` and serves until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("listening on {addr}"))?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener. In-flight requests finish after
    /// `shutdown` is cancelled; the sweeper stops with it.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let local_addr = listener.local_addr().context("getting local address")?;
        let app = self.router();

        let sweeper = ExpirySweeper::new(
            self.store.clone(),
            self.config.sweep_period,
            self.config.staleness_deadline,
        )
        .spawn(shutdown.clone());

        info!(addr = %local_addr, "[aggregator] listening");
        let server_shutdown = shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;

        shutdown.cancel();
        if let Err(e) = sweeper.await {
            error!("[aggregator] sweeper task failed: {}", e);
        }
        result.context("aggregator server error")?;
        info!("[aggregator] stopped");
        Ok(())
    }
}
