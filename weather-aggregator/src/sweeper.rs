use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::ReadingStore;

/// Periodically evicts stations that stopped sending updates.
///
/// Eviction does not commit a snapshot: the durable file catches up with
/// the next accepted update.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    store: Arc<ReadingStore>,
    period: Duration,
    deadline: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<ReadingStore>, period: Duration, deadline: Duration) -> Self {
        Self {
            store,
            period,
            deadline,
        }
    }

    /// One pass as of `now`. Returns the number of evicted stations.
    pub fn sweep_at(&self, now: OffsetDateTime) -> usize {
        let evicted = self.store.for_each_expired(now, self.deadline, |reading| {
            info!(
                producer = %reading.producer_id,
                last_contact = %reading.last_contact,
                "[sweeper] removing expired station"
            );
        });
        if evicted > 0 {
            debug!(evicted, remaining = self.store.len(), "[sweeper] sweep finished");
        }
        evicted
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(OffsetDateTime::now_utc())
    }

    /// Runs until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        info!(
            period = ?self.period,
            deadline = ?self.deadline,
            "[sweeper] starting expiry sweeps"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("[sweeper] stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        self.sweep();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reading;
    use weather_protocol::Attributes;

    fn put(store: &ReadingStore, id: &str) {
        let attributes: Attributes = [("id".to_string(), id.to_string())].into();
        store.put(Reading::new(id, 1, attributes));
    }

    #[test]
    fn test_sweep_before_deadline_keeps_station() {
        let store = Arc::new(ReadingStore::new());
        put(&store, "S1");
        let sweeper = ExpirySweeper::new(store.clone(), Duration::from_secs(10), Duration::from_secs(30));

        let now = OffsetDateTime::now_utc() + Duration::from_secs(29);
        assert_eq!(sweeper.sweep_at(now), 0);
        assert!(store.contains("S1"));
    }

    #[test]
    fn test_sweep_after_deadline_evicts_station() {
        let store = Arc::new(ReadingStore::new());
        put(&store, "S1");
        let sweeper = ExpirySweeper::new(store.clone(), Duration::from_secs(10), Duration::from_secs(30));

        let now = OffsetDateTime::now_utc() + Duration::from_secs(31);
        assert_eq!(sweeper.sweep_at(now), 1);
        assert!(!store.contains("S1"));
    }

    #[tokio::test]
    async fn test_background_sweep_evicts_and_stops() {
        let store = Arc::new(ReadingStore::new());
        put(&store, "S1");
        let sweeper = ExpirySweeper::new(store.clone(), Duration::from_millis(20), Duration::from_millis(50));
        let shutdown = CancellationToken::new();
        let handle = sweeper.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
