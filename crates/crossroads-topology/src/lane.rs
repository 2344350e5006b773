//! Lane identifiers and routes through the intersection.

use std::fmt;

/// Opaque identifier for an entry or exit point of the intersection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LaneId(String);

impl LaneId {
    /// Create a lane identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LaneId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LaneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A path through the intersection: where the vehicle enters and where it leaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub entry: LaneId,
    pub exit: LaneId,
}

impl Route {
    /// Create a route from an entry and an exit lane.
    pub fn new(entry: impl Into<LaneId>, exit: impl Into<LaneId>) -> Self {
        Self {
            entry: entry.into(),
            exit: exit.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.entry, self.exit)
    }
}
