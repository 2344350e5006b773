//! The broadcastable vehicle state snapshot.

use std::fmt;
use std::str::FromStr;

use crossroads_topology::Route;
use serde::{Deserialize, Serialize};

use crate::error::{BeaconError, ParsePolicyError, Result};
use crate::vehicle::{Timestamp, VehicleId, VehicleStatus};

/// Which admission protocol a beacon belongs to.
///
/// Vehicles running different variants interpret beacon fields differently,
/// so a beacon tagged with another variant is treated as foreign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    /// Single occupancy: one vehicle in the intersection at a time.
    Serial,
    /// Geometrically independent routes may cross together.
    Parallel,
    /// Timed reservations with just-in-time arrival.
    Reservation,
}

impl PolicyKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
            Self::Reservation => "reservation",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "parallel" => Ok(Self::Parallel),
            "reservation" => Ok(Self::Reservation),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

/// A vehicle's broadcast state.
///
/// `entry_time` and `crossing_duration_ms` are only populated by the
/// reservation variant and only meaningful once `status != Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    pub sender: VehicleId,
    pub protocol: PolicyKind,
    pub status: VehicleStatus,
    pub route: Route,
    pub sequence: u64,
    pub entry_time: Option<Timestamp>,
    pub crossing_duration_ms: Option<u64>,
}

impl Beacon {
    /// Create an idle beacon for a vehicle about to travel `route`.
    pub fn new(sender: VehicleId, protocol: PolicyKind, route: Route) -> Self {
        Self {
            sender,
            protocol,
            status: VehicleStatus::Idle,
            route,
            sequence: 0,
            entry_time: None,
            crossing_duration_ms: None,
        }
    }

    /// Attach the estimated time the vehicle needs to cross.
    #[must_use]
    pub fn with_crossing_duration(mut self, ms: u64) -> Self {
        self.crossing_duration_ms = Some(ms);
        self
    }

    /// Set the status field.
    #[must_use]
    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the published entry time.
    #[must_use]
    pub fn with_entry_time(mut self, entry_time: Timestamp) -> Self {
        self.entry_time = Some(entry_time);
        self
    }

    /// Set the sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Estimated time the sender leaves the intersection, if it published one.
    pub fn exit_time(&self) -> Option<Timestamp> {
        let entry = self.entry_time?;
        Some(entry.plus_millis(self.crossing_duration_ms.unwrap_or(0)))
    }

    /// Encode for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| BeaconError::Encode(e.to_string()))
    }

    /// Decode a received payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| BeaconError::Malformed(e.to_string()))
    }
}

impl fmt::Display for Beacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} {} {} via {}",
            self.protocol, self.sequence, self.sender, self.status, self.route
        )?;
        if let Some(entry) = self.entry_time {
            write!(f, " entry={entry}")?;
        }
        Ok(())
    }
}
