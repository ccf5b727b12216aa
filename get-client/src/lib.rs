//! Weather query client.

pub mod client;
pub mod display;

pub use client::{QueryClient, QueryError};
pub use display::{filter_station, render, NO_DATA};
