//! Station file loading.
//!
//! Two formats are accepted: a flat JSON object, or one `key: value` entry per
//! line (split on the first `:`, both sides trimmed, blank and separator-less
//! lines skipped). Either way the station must carry an `id`.

use std::path::{Path, PathBuf};
use weather_protocol::payload::{self, Attributes, PayloadError};

#[derive(Debug, thiserror::Error)]
pub enum StationFileError {
    #[error("cannot read station file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("station file is empty")]
    Empty,
    #[error("invalid station data: {0}")]
    Payload(#[from] PayloadError),
}

pub async fn load_station(path: &Path) -> Result<Attributes, StationFileError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StationFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_station(&text)
}

pub fn parse_station(text: &str) -> Result<Attributes, StationFileError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StationFileError::Empty);
    }
    if trimmed.starts_with('{') {
        return Ok(payload::decode_reading(trimmed.as_bytes())?);
    }

    let attributes: Attributes = trimmed
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect();
    payload::producer_id(&attributes)?;
    Ok(attributes)
}
