//! Error types for crossroads-topology.

use thiserror::Error;

/// Result type for topology construction.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Errors raised while building or loading a topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A conflict declaration named a lane that was never declared.
    #[error("unknown lane {0:?}")]
    UnknownLane(String),

    /// The same lane identifier was declared twice.
    #[error("duplicate lane {0:?}")]
    DuplicateLane(String),

    /// The topology table could not be parsed.
    #[error("invalid topology table: {0}")]
    Parse(String),

    /// The topology file could not be read.
    #[error("failed to read topology: {0}")]
    Io(#[from] std::io::Error),
}
