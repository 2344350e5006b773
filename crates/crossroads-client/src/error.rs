//! Error types for the intersection client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a vehicle client.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Topology could not be loaded
    #[error("Topology error: {0}")]
    Topology(#[from] crossroads_topology::TopologyError),

    /// Beacon could not be encoded or decoded
    #[error("Beacon error: {0}")]
    Beacon(#[from] crossroads_beacon::BeaconError),

    /// Beacon transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The detector reported an error and the crossing was abandoned
    #[error("Crossing aborted: {0}")]
    Aborted(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
