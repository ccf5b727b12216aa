use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use weather_protocol::payload::{self, Attributes, PayloadError};
use weather_protocol::{parse_clock, weather_endpoint, LogicalClock, LAMPORT_CLOCK_HEADER};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("cannot reach aggregator: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("aggregator answered with status {0}")]
    Status(StatusCode),
    #[error("unexpected response body: {0}")]
    Payload(#[from] PayloadError),
}

/// Query side of the protocol: ticks before each GET, folds the server clock in.
pub struct QueryClient {
    client: Client,
    endpoint: String,
    clock: LogicalClock,
}

impl QueryClient {
    pub fn new(server: &str) -> Result<Self, QueryError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint: weather_endpoint(server),
            clock: LogicalClock::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub async fn fetch(&self) -> Result<Vec<Attributes>, QueryError> {
        let clock = self.clock.tick();
        debug!(clock, endpoint = %self.endpoint, "[get-client] sending GET");

        let response = self
            .client
            .get(&self.endpoint)
            .header(LAMPORT_CLOCK_HEADER, clock.to_string())
            .send()
            .await?;

        if let Some(server_clock) = response
            .headers()
            .get(LAMPORT_CLOCK_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_clock)
        {
            if self.clock.update(server_clock).is_none() {
                warn!(server_clock, "[get-client] server clock out of range, ignored");
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status(status));
        }
        let body = response.bytes().await?;
        Ok(payload::decode_snapshot(&body)?)
    }
}
