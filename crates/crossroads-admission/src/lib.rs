//! Crossroads Admission Policies
//!
//! Decides whether a vehicle may enter a shared intersection using nothing
//! but its local [`NeighborSnapshot`](crossroads_beacon::NeighborSnapshot).
//! There is no arbiter; every vehicle runs the same policy over whatever
//! beacons it has heard and reaches a compatible answer.
//!
//! # Layering
//!
//! The three variants compose rather than inherit:
//!
//! ```text
//! ReservationPolicy ── wraps ──> ParallelPolicy ── wraps ──> SerialPolicy
//!   timed slots,                  joins non-conflicting        one vehicle at
//!   just-in-time arrival          crossing vehicles            a time, tie-break
//! ```
//!
//! Each layer asks the one beneath it first and only widens admission when
//! the inner layer refuses. The conflict relation is injected as a
//! [`ConflictDetector`](crossroads_topology::ConflictDetector).
//!
//! # Example
//!
//! ```
//! use crossroads_admission::{AdmissionPolicy, Evaluation, ParallelPolicy, SerialPolicy, TieBreak};
//! use crossroads_beacon::{Beacon, NeighborTable, PolicyKind, Route, Timestamp, VehicleId, VehicleStatus};
//! use crossroads_topology::presets;
//!
//! let policy = ParallelPolicy::new(
//!     SerialPolicy::new(TieBreak::HigherIdFirst),
//!     presets::two_lane_four_way(),
//! );
//!
//! // Vehicle 5 is already driving north to south.
//! let mut table = NeighborTable::new(VehicleId(9));
//! table.update(
//!     Beacon::new(VehicleId(5), PolicyKind::Parallel, Route::new("N", "S"))
//!         .with_status(VehicleStatus::Crossing),
//!     Timestamp(0),
//! );
//!
//! // Vehicle 9 drives the opposite way and may join it.
//! let route = Route::new("S", "N");
//! let snapshot = table.snapshot();
//! let state = policy.is_safe_to_cross(&Evaluation::new(VehicleId(9), &route, &snapshot, Timestamp(100)));
//! assert!(state.is_immediate(Timestamp(100)));
//! ```

mod error;
mod parallel;
mod policy;
mod priority;
mod reservation;
mod safe_state;
mod schedule;
mod serial;

pub use error::ParseOptionError;
pub use parallel::ParallelPolicy;
pub use policy::{build_policy, AdmissionPolicy, BaselinePolicy, Evaluation, PolicyOptions};
pub use priority::TieBreak;
pub use reservation::ReservationPolicy;
pub use safe_state::SafeState;
pub use schedule::{EarliestEntry, FirstFit, SlotSelection, SlotStrategy};
pub use serial::SerialPolicy;

pub use crossroads_beacon::PolicyKind;
