//! Parallel admission of geometrically independent routes.

use crossroads_beacon::PolicyKind;
use crossroads_topology::ConflictDetector;
use tracing::trace;

use crate::policy::{AdmissionPolicy, BaselinePolicy, Evaluation};
use crate::priority::TieBreak;
use crate::safe_state::SafeState;

/// Lets a vehicle join non-conflicting vehicles already in the intersection.
///
/// The baseline always gets the first word. Only when it says no does this
/// layer look at who is crossing:
///
/// - any conflicting crossing neighbor: wait
/// - crossing neighbors, none conflicting, but a conflicting requestor
///   outranks self: wait
/// - crossing neighbors, none conflicting: safe now
/// - nobody crossing: the baseline's no stands
#[derive(Debug, Clone)]
pub struct ParallelPolicy<B, C> {
    baseline: B,
    detector: C,
}

impl<B, C> ParallelPolicy<B, C>
where
    B: BaselinePolicy,
    C: ConflictDetector,
{
    pub fn new(baseline: B, detector: C) -> Self {
        Self { baseline, detector }
    }

    pub fn baseline(&self) -> &B {
        &self.baseline
    }

    pub fn detector(&self) -> &C {
        &self.detector
    }
}

impl<B, C> AdmissionPolicy for ParallelPolicy<B, C>
where
    B: BaselinePolicy,
    C: ConflictDetector,
{
    fn kind(&self) -> PolicyKind {
        PolicyKind::Parallel
    }

    fn is_safe_to_cross(&self, eval: &Evaluation<'_>) -> SafeState {
        let baseline = self.baseline.is_safe_to_cross(eval);
        if baseline.is_safe {
            return baseline;
        }

        let mut any_crossing = false;
        for entry in eval.neighbors.crossing() {
            any_crossing = true;
            if self.detector.conflicts(eval.route, &entry.beacon.route) {
                trace!(
                    me = %eval.self_id,
                    other = %entry.vehicle_id,
                    route = %entry.beacon.route,
                    "conflicting vehicle is crossing"
                );
                return SafeState::wait();
            }
        }

        if !any_crossing {
            return baseline;
        }

        // Two requestors that conflict with each other may both be free to
        // join the same occupant. Only the higher-ranked one goes.
        let tie_break = self.baseline.tie_break();
        for entry in eval.neighbors.requesting() {
            if tie_break.outranks(entry.vehicle_id, eval.self_id)
                && self.detector.conflicts(eval.route, &entry.beacon.route)
            {
                trace!(
                    me = %eval.self_id,
                    other = %entry.vehicle_id,
                    "outranked by conflicting requestor, not joining"
                );
                return SafeState::wait();
            }
        }

        trace!(me = %eval.self_id, "crossing in parallel");
        SafeState::at(eval.now)
    }
}

impl<B, C> BaselinePolicy for ParallelPolicy<B, C>
where
    B: BaselinePolicy,
    C: ConflictDetector,
{
    fn has_highest_priority(&self, eval: &Evaluation<'_>) -> bool {
        self.baseline.has_highest_priority(eval)
    }

    fn tie_break(&self) -> TieBreak {
        self.baseline.tie_break()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::SerialPolicy;
    use crossroads_beacon::{
        Beacon, NeighborEntry, NeighborSnapshot, NeighborTable, Route, Timestamp, VehicleId,
        VehicleStatus,
    };
    use crossroads_topology::{presets, IntersectionTopology};
    use proptest::prelude::*;

    /// A four-way intersection where only the listed pairs conflict.
    fn crossing_streets() -> IntersectionTopology {
        IntersectionTopology::builder("independent-streets")
            .lanes(["N", "S", "E", "W"])
            .conflict(Route::new("N", "S"), Route::new("S", "N"))
            .build()
            .unwrap()
    }

    fn entry(id: u8, status: VehicleStatus, route: Route) -> NeighborEntry {
        NeighborEntry {
            vehicle_id: VehicleId(id),
            beacon: Beacon::new(VehicleId(id), PolicyKind::Parallel, route).with_status(status),
            last_receipt: Timestamp(0),
        }
    }

    fn evaluate<C: ConflictDetector>(
        policy: &ParallelPolicy<SerialPolicy, C>,
        me: u8,
        route: Route,
        neighbors: Vec<NeighborEntry>,
        now: u64,
    ) -> SafeState {
        let snapshot = NeighborSnapshot::from_entries(neighbors);
        policy.is_safe_to_cross(&Evaluation::new(VehicleId(me), &route, &snapshot, Timestamp(now)))
    }

    #[test]
    fn simultaneous_requestors_are_arbitrated_by_baseline() {
        // 5 goes N->S, 9 goes E->W; the streets do not conflict.
        let policy = ParallelPolicy::new(SerialPolicy::default(), crossing_streets());
        let now = 1_000;

        let five = evaluate(
            &policy,
            5,
            Route::new("N", "S"),
            vec![entry(9, VehicleStatus::Requesting, Route::new("E", "W"))],
            now,
        );
        let nine = evaluate(
            &policy,
            9,
            Route::new("E", "W"),
            vec![entry(5, VehicleStatus::Requesting, Route::new("N", "S"))],
            now,
        );

        assert!(!five.is_safe);
        // 9 is the baseline's candidate but still has to hold through the debounce.
        assert!(!nine.is_immediate(Timestamp(now)));
        assert_eq!(nine, SafeState::provisional());

        // Once 5 is inside, 9 may join immediately.
        let nine = evaluate(
            &policy,
            9,
            Route::new("E", "W"),
            vec![entry(5, VehicleStatus::Crossing, Route::new("N", "S"))],
            now + 500,
        );
        assert_eq!(nine, SafeState::at(Timestamp(now + 500)));
    }

    #[test]
    fn conflicting_crossing_neighbor_blocks() {
        let policy = ParallelPolicy::new(SerialPolicy::default(), presets::two_lane_four_way());
        let state = evaluate(
            &policy,
            9,
            Route::new("E", "W"),
            vec![
                entry(2, VehicleStatus::Crossing, Route::new("W", "N")),
                entry(3, VehicleStatus::Crossing, Route::new("N", "S")),
            ],
            0,
        );
        assert!(!state.is_safe);
    }

    #[test]
    fn nobody_crossing_defers_to_baseline() {
        let policy = ParallelPolicy::new(SerialPolicy::default(), presets::two_lane_four_way());
        let state = evaluate(
            &policy,
            1,
            Route::new("S", "N"),
            vec![entry(4, VehicleStatus::Requesting, Route::new("N", "S"))],
            0,
        );
        assert_eq!(state, SafeState::wait());
    }

    #[test]
    fn crossing_beacon_unblocks_within_one_evaluation() {
        let policy = ParallelPolicy::new(SerialPolicy::default(), presets::two_lane_four_way());
        let mut table = NeighborTable::new(VehicleId(9));
        let route = Route::new("S", "N");

        table.update(
            Beacon::new(VehicleId(5), PolicyKind::Parallel, Route::new("N", "S"))
                .with_status(VehicleStatus::Crossing),
            Timestamp(100),
        );
        let snapshot = table.snapshot();
        let state = policy.is_safe_to_cross(&Evaluation::new(VehicleId(9), &route, &snapshot, Timestamp(150)));
        assert!(state.is_immediate(Timestamp(150)));
    }

    #[test]
    fn outranked_requestor_does_not_join_alongside_rival() {
        // 20 drives N->S. 4 (S->N) and 3 (E->N) are both free to join it but
        // share the north exit.
        let policy = ParallelPolicy::new(SerialPolicy::default(), presets::two_lane_four_way());
        let occupant = entry(20, VehicleStatus::Crossing, Route::new("N", "S"));

        let three = evaluate(
            &policy,
            3,
            Route::new("E", "N"),
            vec![
                occupant.clone(),
                entry(4, VehicleStatus::Requesting, Route::new("S", "N")),
            ],
            1_000,
        );
        assert_eq!(three, SafeState::wait());

        let four = evaluate(
            &policy,
            4,
            Route::new("S", "N"),
            vec![
                occupant.clone(),
                entry(3, VehicleStatus::Requesting, Route::new("E", "N")),
            ],
            1_000,
        );
        assert!(four.is_immediate(Timestamp(1_000)));

        // 4 is in; now it blocks 3 as a conflicting occupant.
        let three = evaluate(
            &policy,
            3,
            Route::new("E", "N"),
            vec![occupant, entry(4, VehicleStatus::Crossing, Route::new("S", "N"))],
            1_500,
        );
        assert!(!three.is_safe);
    }

    #[test]
    fn non_conflicting_rival_does_not_stop_a_join() {
        let policy = ParallelPolicy::new(SerialPolicy::default(), presets::two_lane_four_way());
        let state = evaluate(
            &policy,
            3,
            Route::new("S", "N"),
            vec![
                entry(20, VehicleStatus::Crossing, Route::new("N", "S")),
                // Right turn out of the west side, clear of S->N.
                entry(9, VehicleStatus::Requesting, Route::new("W", "S")),
            ],
            0,
        );
        assert!(state.is_immediate(Timestamp(0)));
    }

    fn side() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("N"), Just("E"), Just("S"), Just("W")]
    }

    fn route() -> impl Strategy<Value = Route> {
        (side(), side())
            .prop_filter("no u-turns", |(a, b)| a != b)
            .prop_map(|(a, b)| Route::new(a, b))
    }

    proptest! {
        /// A is crossing; B never conflicts with it, so B is admitted at once.
        #[test]
        fn non_conflicting_vehicle_joins_crossing_one(a in route(), b in route(), ida in 1u8..100, idb in 100u8..200) {
            let topology = presets::two_lane_four_way();
            prop_assume!(!topology.conflicts(&a, &b));
            let policy = ParallelPolicy::new(SerialPolicy::default(), topology);
            let state = evaluate(&policy, idb, b, vec![entry(ida, VehicleStatus::Crossing, a)], 42);
            prop_assert!(state.is_immediate(Timestamp(42)));
        }

        #[test]
        fn conflicting_vehicle_never_joins(a in route(), b in route(), ida in 1u8..100, idb in 100u8..200) {
            let topology = presets::two_lane_four_way();
            prop_assume!(topology.conflicts(&a, &b));
            let policy = ParallelPolicy::new(SerialPolicy::default(), topology);
            let state = evaluate(&policy, idb, b, vec![entry(ida, VehicleStatus::Crossing, a)], 42);
            prop_assert!(!state.is_safe);
        }
    }
}
