//! Crossroads Intersection Topology
//!
//! Static description of a shared intersection: the lanes a vehicle may enter
//! and leave by, and which pairs of routes through the intersection physically
//! conflict.
//!
//! # Conflict Relation
//!
//! A [`Route`] is an `(entry, exit)` pair. The topology answers a single
//! question for the admission layers above it:
//!
//! ```text
//! conflicts(entryA, exitA, entryB, exitB) -> bool
//! ```
//!
//! The relation is symmetric by construction and is never mutated after the
//! topology is built. It is loaded once at startup, either from one of the
//! built-in [`presets`] or (with the `serde` feature) from a JSON table.
//!
//! # Example
//!
//! ```
//! use crossroads_topology::{presets, ConflictDetector, Route};
//!
//! let topology = presets::two_lane_four_way();
//! let north_south = Route::new("N", "S");
//! let south_north = Route::new("S", "N");
//! let east_west = Route::new("E", "W");
//!
//! assert!(!topology.conflicts(&north_south, &south_north));
//! assert!(topology.conflicts(&north_south, &east_west));
//! ```

mod conflict;
mod error;
mod lane;
pub mod presets;

pub use conflict::{ConflictDetector, IntersectionTopology, TopologyBuilder};
pub use error::{Result, TopologyError};
pub use lane::{LaneId, Route};

#[cfg(feature = "serde")]
pub use conflict::TopologySpec;
