//! Crossroads Beacons and Neighbor Tables
//!
//! Vehicles approaching a shared intersection periodically broadcast a
//! [`Beacon`]: who they are, where they are going, and how far along their
//! crossing episode they are. Every vehicle folds the beacons it hears into a
//! local [`NeighborTable`], which is the only evidence the admission policies
//! ever look at.
//!
//! # Local View Only
//!
//! There is no shared state and no arbiter. A neighbor exists for as long as
//! its beacons keep arriving:
//!
//! ```text
//! beacon received  -> upsert entry, lastLocalReceiptTime = now
//! every cycle      -> evict entries with now - lastLocalReceiptTime > maxAge
//! ```
//!
//! A peer that left the intersection and a peer that went silent converge to
//! the same outcome: eviction.

mod beacon;
mod error;
mod neighbors;
mod vehicle;

pub use beacon::{Beacon, PolicyKind};
pub use error::{BeaconError, ParsePolicyError, Result};
pub use neighbors::{
    NeighborEntry, NeighborSnapshot, NeighborStats, NeighborTable, UpdateOutcome, REORDER_WINDOW,
};
pub use vehicle::{Timestamp, VehicleId, VehicleStatus};

pub use crossroads_topology::{LaneId, Route};
