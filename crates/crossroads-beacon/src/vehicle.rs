//! Vehicle identity, crossing status and time.

use std::fmt;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Small stable vehicle identifier, derived from the last octet of its address.
///
/// Doubles as the priority key when vehicles compete for the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub u8);

impl VehicleId {
    /// Derive the identifier from a network address (its last octet).
    pub fn from_ip(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self(v4.octets()[3]),
            IpAddr::V6(v6) => Self(v6.octets()[15]),
        }
    }

    /// The raw identifier.
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vehicle-{}", self.0)
    }
}

/// Where a vehicle is in its crossing episode.
///
/// Monotonic per episode: `Idle -> Requesting -> Crossing -> Exiting -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VehicleStatus {
    #[default]
    Idle,
    Requesting,
    Crossing,
    Exiting,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Requesting => write!(f, "REQUESTING"),
            Self::Crossing => write!(f, "CROSSING"),
            Self::Exiting => write!(f, "EXITING"),
        }
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// "No concrete time": later than every real timestamp.
    pub const UNSCHEDULED: Self = Self(u64::MAX);

    /// Create from epoch milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(ms)
    }

    /// Epoch milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whether this is a real point in time rather than [`UNSCHEDULED`](Self::UNSCHEDULED).
    pub const fn is_scheduled(&self) -> bool {
        self.0 != u64::MAX
    }

    /// Milliseconds elapsed since `earlier`, or zero if `earlier` is in the future.
    pub const fn saturating_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// This timestamp shifted forward by `ms` milliseconds.
    #[must_use]
    pub const fn plus_millis(&self, ms: u64) -> Timestamp {
        Self(self.0.saturating_add(ms))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scheduled() {
            write!(f, "{}ms", self.0)
        } else {
            write!(f, "unscheduled")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn vehicle_id_from_last_octet() {
        let addr = IpAddr::V4(Ipv4Addr::new(10, 11, 12, 37));
        assert_eq!(VehicleId::from_ip(addr), VehicleId(37));

        let v6 = IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0x0109));
        assert_eq!(VehicleId::from_ip(v6), VehicleId(9));
    }

    #[test]
    fn vehicle_id_display() {
        assert_eq!(VehicleId(5).to_string(), "vehicle-5");
    }

    #[test]
    fn timestamp_arithmetic_saturates() {
        let t = Timestamp(1_000);
        assert_eq!(t.plus_millis(500), Timestamp(1_500));
        assert_eq!(t.saturating_since(Timestamp(400)), 600);
        assert_eq!(t.saturating_since(Timestamp(5_000)), 0);
        assert_eq!(Timestamp::UNSCHEDULED.plus_millis(1), Timestamp::UNSCHEDULED);
    }

    #[test]
    fn unscheduled_is_later_than_everything() {
        assert!(Timestamp::UNSCHEDULED > Timestamp(u64::MAX - 1));
        assert!(!Timestamp::UNSCHEDULED.is_scheduled());
        assert!(Timestamp(0).is_scheduled());
    }

    #[test]
    fn status_display() {
        assert_eq!(VehicleStatus::Requesting.to_string(), "REQUESTING");
        assert_eq!(VehicleStatus::default(), VehicleStatus::Idle);
    }
}
