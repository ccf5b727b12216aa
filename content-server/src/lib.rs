//! Weather station producer.
//!
//! Reads a station file and PUTs it to the aggregator, carrying a Lamport
//! clock across uploads.

pub mod station;
pub mod uploader;

pub use station::{load_station, parse_station, StationFileError};
pub use uploader::{RetryPolicy, UploadError, UploadReceipt, Uploader};
