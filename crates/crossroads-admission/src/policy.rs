//! Policy traits and construction.

use crossroads_beacon::{NeighborSnapshot, PolicyKind, Route, Timestamp, VehicleId};
use crossroads_topology::ConflictDetector;

use crate::parallel::ParallelPolicy;
use crate::priority::TieBreak;
use crate::reservation::ReservationPolicy;
use crate::safe_state::SafeState;
use crate::schedule::SlotStrategy;
use crate::serial::SerialPolicy;

/// Everything a policy may look at for one decision.
#[derive(Debug, Clone, Copy)]
pub struct Evaluation<'a> {
    pub self_id: VehicleId,
    pub route: &'a Route,
    pub neighbors: &'a NeighborSnapshot,
    pub now: Timestamp,
}

impl<'a> Evaluation<'a> {
    pub fn new(
        self_id: VehicleId,
        route: &'a Route,
        neighbors: &'a NeighborSnapshot,
        now: Timestamp,
    ) -> Self {
        Self {
            self_id,
            route,
            neighbors,
            now,
        }
    }
}

/// A pure decision function over the local neighbor view.
///
/// Evaluations are idempotent: the same inputs always yield the same
/// [`SafeState`], and nothing is remembered between calls.
pub trait AdmissionPolicy: Send + Sync {
    /// Which protocol variant this is. Beacons are tagged with it.
    fn kind(&self) -> PolicyKind;

    /// Decide whether, and from when, the vehicle may enter.
    fn is_safe_to_cross(&self, eval: &Evaluation<'_>) -> SafeState;
}

/// The single-occupancy primitive the layered policies build on.
///
/// Contract: among mutually conflicting requestors at most one is ever told
/// it has highest priority, ordered by [`tie_break`](Self::tie_break).
pub trait BaselinePolicy: AdmissionPolicy {
    /// True if nobody is crossing and no requesting peer outranks self.
    fn has_highest_priority(&self, eval: &Evaluation<'_>) -> bool;

    /// The order used to arbitrate between requestors.
    fn tie_break(&self) -> TieBreak;
}

impl<P: AdmissionPolicy + ?Sized> AdmissionPolicy for Box<P> {
    fn kind(&self) -> PolicyKind {
        (**self).kind()
    }

    fn is_safe_to_cross(&self, eval: &Evaluation<'_>) -> SafeState {
        (**self).is_safe_to_cross(eval)
    }
}

/// Knobs shared by all variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyOptions {
    pub tie_break: TieBreak,
    pub slot_selection: SlotStrategy,
}

impl PolicyOptions {
    #[must_use]
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    #[must_use]
    pub fn with_slot_selection(mut self, slot_selection: SlotStrategy) -> Self {
        self.slot_selection = slot_selection;
        self
    }
}

/// Assemble the layered policy stack for `kind`.
pub fn build_policy<C>(kind: PolicyKind, detector: C, options: PolicyOptions) -> Box<dyn AdmissionPolicy>
where
    C: ConflictDetector + 'static,
{
    let serial = SerialPolicy::new(options.tie_break);
    match kind {
        PolicyKind::Serial => Box::new(serial),
        PolicyKind::Parallel => Box::new(ParallelPolicy::new(serial, detector)),
        PolicyKind::Reservation => Box::new(ReservationPolicy::with_slot_selection(
            ParallelPolicy::new(serial, detector),
            options.slot_selection,
        )),
    }
}
