/**
 * REQUEST COORDINATOR - one producer update or one query per connection
 *
 * ROLE:
 * Ties clock, store and persistence together. The transport adapter (http.rs)
 * only decodes framing and maps outcomes to status codes.
 *
 * UPDATE:  clock update|tick -> store.put -> commit -> created|ok|internal error
 * QUERY:   clock tick -> snapshot(cap) -> ok + readings
 *
 * Commit failures keep the in-memory update: the latest reading stays
 * available even though the producer is told the update failed.
 */

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use weather_protocol::payload::{self, Attributes};
use weather_protocol::LogicalClock;

use crate::models::Reading;
use crate::persistence::PersistenceManager;
use crate::store::ReadingStore;

/// Producer update as it crosses the transport boundary.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub foreign_clock: Option<u64>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Created,
    Ok,
    NoContent,
    Unprocessable,
    InternalError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub status: UpdateStatus,
    pub clock: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub clock: u64,
    pub readings: Vec<Attributes>,
}

#[derive(Debug, Clone)]
pub struct RequestCoordinator {
    clock: Arc<LogicalClock>,
    store: Arc<ReadingStore>,
    persistence: Arc<PersistenceManager>,
    snapshot_cap: usize,
}

impl RequestCoordinator {
    pub fn new(
        clock: Arc<LogicalClock>,
        store: Arc<ReadingStore>,
        persistence: Arc<PersistenceManager>,
        snapshot_cap: usize,
    ) -> Self {
        Self {
            clock,
            store,
            persistence,
            snapshot_cap,
        }
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn store(&self) -> &ReadingStore {
        &self.store
    }

    /// Handles a producer PUT.
    pub async fn ingest(&self, request: UpdateRequest) -> UpdateOutcome {
        if payload::is_blank(&request.body) {
            let clock = match request.foreign_clock {
                Some(foreign) => match self.clock.update(foreign) {
                    Some(clock) => clock,
                    None => return self.refuse_clock(foreign),
                },
                None => self.clock.value(),
            };
            debug!(clock, "[coordinator] empty update body");
            return UpdateOutcome {
                status: UpdateStatus::NoContent,
                clock,
            };
        }

        let attributes = match payload::decode_reading(&request.body) {
            Ok(attributes) => attributes,
            Err(e) => {
                warn!("[coordinator] rejected update: {}", e);
                return UpdateOutcome {
                    status: UpdateStatus::Unprocessable,
                    clock: self.clock.value(),
                };
            }
        };
        // decode_reading has already checked the id.
        let producer_id = match payload::producer_id(&attributes) {
            Ok(id) => id.to_string(),
            Err(_) => {
                return UpdateOutcome {
                    status: UpdateStatus::Unprocessable,
                    clock: self.clock.value(),
                }
            }
        };

        let clock = match request.foreign_clock {
            Some(foreign) => match self.clock.update(foreign) {
                Some(clock) => clock,
                None => return self.refuse_clock(foreign),
            },
            None => self.clock.tick(),
        };

        let previous = self.store.put(Reading::new(producer_id.clone(), clock, attributes));

        let persistence = self.persistence.clone();
        let store = self.store.clone();
        let committed = tokio::task::spawn_blocking(move || persistence.commit(|| store.records())).await;

        let status = match committed {
            Ok(Ok(_)) if previous.is_none() => UpdateStatus::Created,
            Ok(Ok(_)) => UpdateStatus::Ok,
            Ok(Err(e)) => {
                error!(producer = %producer_id, "[coordinator] snapshot commit failed: {}", e);
                UpdateStatus::InternalError
            }
            Err(e) => {
                error!(producer = %producer_id, "[coordinator] commit task failed: {}", e);
                UpdateStatus::InternalError
            }
        };

        info!(producer = %producer_id, clock, ?status, "[coordinator] update processed");
        UpdateOutcome { status, clock }
    }

    /// Foreign clock the Lamport rule cannot absorb without wrapping.
    fn refuse_clock(&self, foreign: u64) -> UpdateOutcome {
        warn!(foreign, "[coordinator] rejected update: clock out of range");
        UpdateOutcome {
            status: UpdateStatus::Unprocessable,
            clock: self.clock.value(),
        }
    }

    /// Handles a GET. A query is itself a logical event, so it always ticks.
    pub fn query(&self) -> QueryOutcome {
        let clock = self.clock.tick();
        let readings: Vec<Attributes> = self
            .store
            .snapshot(self.snapshot_cap)
            .into_iter()
            .map(|reading| reading.attributes)
            .collect();
        debug!(clock, readings = readings.len(), "[coordinator] query served");
        QueryOutcome { clock, readings }
    }
}
