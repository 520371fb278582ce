//! Authenticated client for the stream aggregator's management API:
//! channels, streams, groups, logos, providers, profiles, playlist
//! refresh triggers, and live proxy status.

pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use client::{AggregatorClient, AggregatorClientConfig};
pub use error::{AggregatorError, Result};
pub use types::{LoginResponse, PaginatedResponse, ProxyStatusEntry, ProxyStatusMap};
