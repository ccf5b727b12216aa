use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use weather_protocol::Attributes;

/// Latest accepted reading of one producer, as held in the store and
/// written to the durable snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Station identity, taken from the payload's `id` attribute.
    pub producer_id: String,
    /// Aggregator's Lamport time when the reading was accepted.
    pub received_logical_time: u64,
    /// Wall-clock time of the last contact; only used for expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub last_contact: OffsetDateTime,
    /// Producer payload, untouched.
    pub attributes: Attributes,
}

impl Reading {
    pub fn new(producer_id: impl Into<String>, received_logical_time: u64, attributes: Attributes) -> Self {
        Self {
            producer_id: producer_id.into(),
            received_logical_time,
            last_contact: OffsetDateTime::now_utc(),
            attributes,
        }
    }
}
