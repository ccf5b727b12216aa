/**
 * READING STORE - latest reading per station
 *
 * ROLE:
 * Sole authority for reading state. One slot per producer id; a new update
 * replaces the slot, it never appends.
 *
 * CONCURRENCY:
 * - Backed by a sharded concurrent map: producers living in different shards
 *   never wait on each other, same-shard writers wait only for the slot write.
 * - Two racing updates for the SAME producer are applied in arrival order and
 *   the last writer keeps the slot, even when it carries the smaller logical
 *   time. Logical time orders snapshots, not racing writes to one slot.
 * - Snapshots are copies: later mutation never changes a returned snapshot.
 */

use dashmap::DashMap;
use std::time::Duration;
use time::OffsetDateTime;

use crate::models::Reading;

#[derive(Debug, Default)]
pub struct ReadingStore {
    readings: DashMap<String, Reading>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the producer's slot, stamping `last_contact = now`.
    /// Returns the reading that was replaced, if any.
    pub fn put(&self, mut reading: Reading) -> Option<Reading> {
        reading.last_contact = OffsetDateTime::now_utc();
        self.readings.insert(reading.producer_id.clone(), reading)
    }

    /// Reinstates a recovered reading with its persisted `last_contact`.
    pub fn restore(&self, reading: Reading) {
        self.readings.insert(reading.producer_id.clone(), reading);
    }

    pub fn remove(&self, producer_id: &str) -> Option<Reading> {
        self.readings.remove(producer_id).map(|(_, reading)| reading)
    }

    pub fn contains(&self, producer_id: &str) -> bool {
        self.readings.contains_key(producer_id)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Point-in-time copy ordered by logical time (ties by producer id),
    /// keeping only the `capacity` most recent readings.
    pub fn snapshot(&self, capacity: usize) -> Vec<Reading> {
        let mut readings = self.records();
        if readings.len() > capacity {
            readings.drain(..readings.len() - capacity);
        }
        readings
    }

    /// Full ordered copy, used as the persisted view.
    pub fn records(&self) -> Vec<Reading> {
        let mut readings: Vec<Reading> = self
            .readings
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        readings.sort_by(|a, b| {
            a.received_logical_time
                .cmp(&b.received_logical_time)
                .then_with(|| a.producer_id.cmp(&b.producer_id))
        });
        readings
    }

    /// Evicts every reading whose last contact is older than `now - deadline`
    /// and hands each evicted reading to `visitor`. Returns the eviction count.
    ///
    /// Candidates are collected shard by shard, then each one is removed with
    /// an atomic check-and-remove, so a producer refreshed in between keeps
    /// its slot. No lock is held across the whole pass.
    pub fn for_each_expired<F>(&self, now: OffsetDateTime, deadline: Duration, mut visitor: F) -> usize
    where
        F: FnMut(&Reading),
    {
        // A cutoff before the representable range means nothing is that old.
        let Some(cutoff) = time::Duration::try_from(deadline)
            .ok()
            .and_then(|deadline| now.checked_sub(deadline))
        else {
            return 0;
        };
        let candidates: Vec<String> = self
            .readings
            .iter()
            .filter(|entry| entry.value().last_contact < cutoff)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for producer_id in candidates {
            if let Some((_, reading)) = self
                .readings
                .remove_if(&producer_id, |_, reading| reading.last_contact < cutoff)
            {
                visitor(&reading);
                evicted += 1;
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use weather_protocol::Attributes;

    fn reading(id: &str, logical_time: u64, temp: &str) -> Reading {
        let attributes: Attributes = [
            ("id".to_string(), id.to_string()),
            ("temp".to_string(), temp.to_string()),
        ]
        .into();
        Reading::new(id, logical_time, attributes)
    }

    #[test]
    fn test_put_replaces_rather_than_appends() {
        let store = ReadingStore::new();
        assert!(store.put(reading("S1", 1, "21")).is_none());
        let previous = store.put(reading("S1", 2, "22")).unwrap();
        assert_eq!(previous.attributes["temp"], "21");

        let snapshot = store.snapshot(20);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].attributes["temp"], "22");
    }

    #[test]
    fn test_snapshot_orders_by_logical_time_then_id() {
        let store = ReadingStore::new();
        store.put(reading("C", 5, "1"));
        store.put(reading("B", 3, "1"));
        store.put(reading("A", 5, "1"));

        let order: Vec<_> = store.snapshot(10).into_iter().map(|r| r.producer_id).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_snapshot_keeps_latest_when_over_capacity() {
        let store = ReadingStore::new();
        for i in 1..=25u64 {
            store.put(reading(&format!("S{i:02}"), i, "1"));
        }

        let snapshot = store.snapshot(20);
        assert_eq!(snapshot.len(), 20);
        assert_eq!(snapshot.first().unwrap().received_logical_time, 6);
        assert_eq!(snapshot.last().unwrap().received_logical_time, 25);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = ReadingStore::new();
        store.put(reading("S1", 1, "21"));
        let snapshot = store.snapshot(20);
        store.put(reading("S1", 2, "30"));
        store.remove("S1");
        assert_eq!(snapshot[0].attributes["temp"], "21");
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let store = ReadingStore::new();
        assert!(store.remove("ghost").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_for_each_expired_only_evicts_stale() {
        let store = ReadingStore::new();
        store.put(reading("fresh", 2, "1"));
        let mut stale = reading("stale", 1, "1");
        stale.last_contact = OffsetDateTime::now_utc() - Duration::from_secs(60);
        store.restore(stale);

        let mut seen = Vec::new();
        let evicted = store.for_each_expired(OffsetDateTime::now_utc(), Duration::from_secs(30), |r| {
            seen.push(r.producer_id.clone())
        });

        assert_eq!(evicted, 1);
        assert_eq!(seen, vec!["stale"]);
        assert!(store.contains("fresh"));
        assert!(!store.contains("stale"));
    }

    #[test]
    fn test_for_each_expired_with_future_now_evicts_all() {
        let store = ReadingStore::new();
        store.put(reading("S1", 1, "1"));
        store.put(reading("S2", 2, "1"));
        let later = OffsetDateTime::now_utc() + Duration::from_secs(31);
        assert_eq!(store.for_each_expired(later, Duration::from_secs(30), |_| {}), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_for_each_expired_with_huge_deadline_evicts_nothing() {
        let store = ReadingStore::new();
        store.put(reading("S1", 1, "1"));
        let now = OffsetDateTime::now_utc();
        for deadline in [Duration::from_secs(u64::MAX / 2), Duration::MAX] {
            assert_eq!(store.for_each_expired(now, deadline, |_| {}), 0);
        }
        assert!(store.contains("S1"));
    }

    #[test]
    fn test_concurrent_puts_for_distinct_producers() {
        let store = Arc::new(ReadingStore::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..100u64 {
                        store.put(reading(&format!("W{worker}-{i}"), worker * 100 + i, "1"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 800);
    }
}
