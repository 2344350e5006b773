//! Timed reservations on top of parallel admission.

use crossroads_beacon::{NeighborEntry, PolicyKind, Timestamp};
use crossroads_topology::ConflictDetector;
use tracing::{debug, trace};

use crate::parallel::ParallelPolicy;
use crate::policy::{AdmissionPolicy, BaselinePolicy, Evaluation};
use crate::safe_state::SafeState;
use crate::schedule::{SlotSelection, SlotStrategy};

/// Schedules an entry time instead of only answering yes or no.
///
/// Reservation beacons carry `entry_time` and `crossing_duration_ms`, so a
/// vehicle can tell when each conflicting occupant will have left and plan to
/// arrive exactly then. Decision order:
///
/// 1. Top priority overall: enter now.
/// 2. Crossing neighbors: join a non-conflicting one at its entry time unless
///    a conflicting one is also inside; conflicting ones set a floor at their
///    exit time. A join also waits out conflicting higher-priority
///    requestors, which may be joining the same occupant.
/// 3. Top requestor: enter at the floor (or now).
/// 4. Otherwise share a higher-priority requestor's published slot if the
///    routes do not conflict, else queue after the last of them. Wait while
///    they have not published.
///
/// A computed time never precedes the exit of a known conflicting vehicle.
#[derive(Debug, Clone)]
pub struct ReservationPolicy<B, C, S = SlotStrategy> {
    parallel: ParallelPolicy<B, C>,
    slots: S,
}

impl<B, C> ReservationPolicy<B, C>
where
    B: BaselinePolicy,
    C: ConflictDetector,
{
    pub fn new(parallel: ParallelPolicy<B, C>) -> Self {
        Self {
            parallel,
            slots: SlotStrategy::default(),
        }
    }
}

impl<B, C, S> ReservationPolicy<B, C, S>
where
    B: BaselinePolicy,
    C: ConflictDetector,
    S: SlotSelection,
{
    pub fn with_slot_selection(parallel: ParallelPolicy<B, C>, slots: S) -> Self {
        Self { parallel, slots }
    }

    pub fn parallel(&self) -> &ParallelPolicy<B, C> {
        &self.parallel
    }

    fn conflicts_with(&self, eval: &Evaluation<'_>, other: &NeighborEntry) -> bool {
        self.parallel.detector().conflicts(eval.route, &other.beacon.route)
    }
}

fn later(a: Option<Timestamp>, b: Timestamp) -> Option<Timestamp> {
    Some(a.map_or(b, |a| a.max(b)))
}

impl<B, C, S> AdmissionPolicy for ReservationPolicy<B, C, S>
where
    B: BaselinePolicy,
    C: ConflictDetector,
    S: SlotSelection,
{
    fn kind(&self) -> PolicyKind {
        PolicyKind::Reservation
    }

    fn is_safe_to_cross(&self, eval: &Evaluation<'_>) -> SafeState {
        let now = eval.now;
        let me = eval.self_id;

        if self.parallel.has_highest_priority(eval) {
            trace!(%me, "highest priority, entering now");
            return SafeState::at(now);
        }

        // Latest known exit among conflicting vehicles.
        let mut floor: Option<Timestamp> = None;
        let mut join_at: Option<Timestamp> = None;
        for entry in eval.neighbors.crossing() {
            if self.conflicts_with(eval, entry) {
                let Some(exit) = entry.beacon.exit_time() else {
                    debug!(%me, other = %entry.vehicle_id, "conflicting vehicle crossing without a published time");
                    return SafeState::wait();
                };
                floor = later(floor, exit);
            } else if join_at.is_none() {
                join_at = Some(entry.beacon.entry_time.unwrap_or(now));
            }
        }

        let tie_break = self.parallel.tie_break();

        if floor.is_none() {
            if let Some(at) = join_at {
                // A conflicting requestor that outranks self may be joining
                // the same occupant. Go after its slot, never alongside it.
                let mut rival_exit: Option<Timestamp> = None;
                for entry in eval.neighbors.requesting() {
                    if !tie_break.outranks(entry.vehicle_id, me) || !self.conflicts_with(eval, entry) {
                        continue;
                    }
                    let Some(exit) = entry.beacon.exit_time() else {
                        trace!(%me, other = %entry.vehicle_id, "higher-priority rival has no slot yet, not joining");
                        return SafeState::wait();
                    };
                    rival_exit = later(rival_exit, exit);
                }
                let at = rival_exit.map_or(at, |exit| exit.max(at));
                trace!(%me, %at, "joining non-conflicting crossing vehicle");
                return SafeState::at(at);
            }
        }

        let outranking: Vec<&NeighborEntry> = eval
            .neighbors
            .requesting()
            .filter(|entry| tie_break.outranks(entry.vehicle_id, me))
            .collect();

        if outranking.is_empty() {
            let at = floor.map_or(now, |f| f.max(now));
            trace!(%me, %at, "top requestor, entering after conflicting occupants");
            return SafeState::at(at);
        }

        let mut published = Vec::with_capacity(outranking.len());
        for entry in outranking {
            match entry.beacon.entry_time {
                Some(_) => published.push(entry),
                None if self.conflicts_with(eval, entry) => {
                    trace!(%me, other = %entry.vehicle_id, "waiting for higher-priority reservation");
                    return SafeState::wait();
                }
                None => {}
            }
        }
        if published.is_empty() {
            trace!(%me, "no higher-priority requestor has published an entry time");
            return SafeState::wait();
        }

        let mut candidates = Vec::new();
        let mut latest_exit: Option<Timestamp> = None;
        for entry in &published {
            if let Some(exit) = entry.beacon.exit_time() {
                latest_exit = later(latest_exit, exit);
            }
            if self.conflicts_with(eval, entry) {
                if let Some(exit) = entry.beacon.exit_time() {
                    floor = later(floor, exit);
                }
            } else {
                candidates.push(*entry);
            }
        }

        let at = match self.slots.select(&candidates) {
            Some(shared) => {
                let entry = shared.beacon.entry_time.unwrap_or(now);
                trace!(%me, other = %shared.vehicle_id, %entry, "sharing reservation slot");
                entry
            }
            None => latest_exit.unwrap_or(now),
        };
        SafeState::at(floor.map_or(at, |f| f.max(at)))
    }
}

impl<B, C, S> BaselinePolicy for ReservationPolicy<B, C, S>
where
    B: BaselinePolicy,
    C: ConflictDetector,
    S: SlotSelection,
{
    fn has_highest_priority(&self, eval: &Evaluation<'_>) -> bool {
        self.parallel.has_highest_priority(eval)
    }

    fn tie_break(&self) -> crate::priority::TieBreak {
        self.parallel.tie_break()
    }
}
