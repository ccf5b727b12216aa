//! Uploads station readings to the aggregator.
//!
//! Every send is a logical event: the clock ticks before the request and
//! folds in the aggregator's `Lamport-Clock` response header afterwards.
//! Connection errors and 5xx answers are retried; 4xx answers are final.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};
use weather_protocol::payload::{self, Attributes};
use weather_protocol::{parse_clock, weather_endpoint, LogicalClock, LAMPORT_CLOCK_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("cannot reach aggregator: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("aggregator rejected the reading with status {0}")]
    Rejected(StatusCode),
    #[error("aggregator failed with status {0}")]
    Server(StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReceipt {
    pub status: StatusCode,
    /// Aggregator clock from the response, if it sent a valid one.
    pub server_clock: Option<u64>,
}

pub struct Uploader {
    client: Client,
    endpoint: String,
    clock: LogicalClock,
    policy: RetryPolicy,
}

impl Uploader {
    pub fn new(server: &str, policy: RetryPolicy) -> Result<Self, UploadError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint: weather_endpoint(server),
            clock: LogicalClock::new(),
            policy,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub async fn upload(&self, station: &Attributes) -> Result<UploadReceipt, UploadError> {
        let body = payload::encode_reading(station);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.send_once(&body).await {
                Ok(receipt) if receipt.status.is_server_error() => UploadError::Server(receipt.status),
                Ok(receipt) if receipt.status.is_client_error() => {
                    return Err(UploadError::Rejected(receipt.status))
                }
                Ok(receipt) => {
                    info!(
                        status = %receipt.status,
                        clock = self.clock.value(),
                        "[content-server] reading uploaded"
                    );
                    return Ok(receipt);
                }
                Err(e) => e,
            };

            if attempt > self.policy.retries {
                return Err(err);
            }
            warn!(attempt, delay = ?self.policy.delay, "[content-server] upload failed, retrying: {}", err);
            tokio::time::sleep(self.policy.delay).await;
        }
    }

    async fn send_once(&self, body: &[u8]) -> Result<UploadReceipt, UploadError> {
        let clock = self.clock.tick();
        debug!(clock, endpoint = %self.endpoint, "[content-server] sending PUT");

        let response = self
            .client
            .put(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(LAMPORT_CLOCK_HEADER, clock.to_string())
            .body(body.to_vec())
            .send()
            .await?;

        let server_clock = response
            .headers()
            .get(LAMPORT_CLOCK_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_clock);
        if let Some(server_clock) = server_clock {
            if self.clock.update(server_clock).is_none() {
                warn!(server_clock, "[content-server] server clock out of range, ignored");
            }
        }

        Ok(UploadReceipt {
            status: response.status(),
            server_clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_normalised() {
        let uploader = Uploader::new("localhost:4567", RetryPolicy::default()).unwrap();
        assert_eq!(uploader.endpoint(), "http://localhost:4567/weather.json");
    }

    #[tokio::test]
    async fn test_unreachable_server_exhausts_retries() {
        // Nothing listens on this port once the listener is dropped.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let policy = RetryPolicy {
            retries: 2,
            delay: Duration::from_millis(10),
        };
        let uploader = Uploader::new(&addr.to_string(), policy).unwrap();
        let station: Attributes = [("id".to_string(), "S1".to_string())].into();

        let err = uploader.upload(&station).await.unwrap_err();
        assert!(matches!(err, UploadError::Transport(_)));
        // One tick per attempt.
        assert_eq!(uploader.clock().value(), 3);
    }
}
