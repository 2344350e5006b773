//! Error types for crossroads-beacon.

use thiserror::Error;

/// Result type for beacon encoding.
pub type Result<T> = std::result::Result<T, BeaconError>;

/// Errors raised while encoding or decoding beacons.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// The payload could not be decoded as a beacon.
    #[error("malformed beacon: {0}")]
    Malformed(String),

    /// The beacon could not be encoded.
    #[error("failed to encode beacon: {0}")]
    Encode(String),
}

/// A policy name did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown policy {0:?} (expected serial, parallel or reservation)")]
pub struct ParsePolicyError(pub String);
