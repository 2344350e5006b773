//! Discrete events reported by the intersection detector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One physical-sensor transition at the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntersectionEvent {
    /// Passed the approach marker.
    Approaching,
    /// Reached the entrance.
    Entering,
    /// Passed the exit marker.
    Exiting,
    /// The detector lost track; the crossing must be abandoned.
    Error,
}

impl fmt::Display for IntersectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Approaching => "APPROACHING",
            Self::Entering => "ENTERING",
            Self::Exiting => "EXITING",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

impl FromStr for IntersectionEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROACHING" => Ok(Self::Approaching),
            "ENTERING" => Ok(Self::Entering),
            "EXITING" => Ok(Self::Exiting),
            "ERROR" => Ok(Self::Error),
            other => Err(format!("unknown intersection event {other:?}")),
        }
    }
}
