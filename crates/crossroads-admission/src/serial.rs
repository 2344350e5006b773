//! Single-occupancy admission.

use crossroads_beacon::{PolicyKind, VehicleStatus};
use tracing::trace;

use crate::policy::{AdmissionPolicy, BaselinePolicy, Evaluation};
use crate::priority::TieBreak;
use crate::safe_state::SafeState;

/// One vehicle in the intersection at a time.
///
/// A vehicle is a candidate only when nobody is crossing and no requesting
/// neighbor outranks it. The answer is provisional: the daemon must see it
/// hold for the debounce window before committing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPolicy {
    tie_break: TieBreak,
}

impl SerialPolicy {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }
}

impl AdmissionPolicy for SerialPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Serial
    }

    fn is_safe_to_cross(&self, eval: &Evaluation<'_>) -> SafeState {
        if self.has_highest_priority(eval) {
            SafeState::provisional()
        } else {
            SafeState::wait()
        }
    }
}

impl BaselinePolicy for SerialPolicy {
    fn has_highest_priority(&self, eval: &Evaluation<'_>) -> bool {
        for entry in eval.neighbors.iter() {
            match entry.status() {
                VehicleStatus::Crossing => {
                    trace!(me = %eval.self_id, other = %entry.vehicle_id, "neighbor is crossing");
                    return false;
                }
                VehicleStatus::Requesting if self.tie_break.outranks(entry.vehicle_id, eval.self_id) => {
                    trace!(me = %eval.self_id, other = %entry.vehicle_id, "outranked by requesting neighbor");
                    return false;
                }
                _ => {}
            }
        }
        true
    }

    fn tie_break(&self) -> TieBreak {
        self.tie_break
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossroads_beacon::{
        Beacon, NeighborEntry, NeighborSnapshot, Route, Timestamp, VehicleId,
    };

    fn neighbor(id: u8, status: VehicleStatus) -> NeighborEntry {
        NeighborEntry {
            vehicle_id: VehicleId(id),
            beacon: Beacon::new(VehicleId(id), PolicyKind::Serial, Route::new("E", "W"))
                .with_status(status),
            last_receipt: Timestamp(0),
        }
    }

    fn evaluate(policy: &SerialPolicy, me: u8, neighbors: Vec<NeighborEntry>) -> SafeState {
        let route = Route::new("N", "S");
        let snapshot = NeighborSnapshot::from_entries(neighbors);
        policy.is_safe_to_cross(&Evaluation::new(VehicleId(me), &route, &snapshot, Timestamp(10)))
    }

    #[test]
    fn alone_is_provisionally_safe() {
        let state = evaluate(&SerialPolicy::default(), 5, vec![]);
        assert_eq!(state, SafeState::provisional());
    }

    #[test]
    fn anyone_crossing_blocks() {
        let state = evaluate(&SerialPolicy::default(), 9, vec![neighbor(2, VehicleStatus::Crossing)]);
        assert!(!state.is_safe);
    }

    #[test]
    fn outranking_requestor_blocks() {
        let policy = SerialPolicy::default();
        assert!(!evaluate(&policy, 5, vec![neighbor(9, VehicleStatus::Requesting)]).is_safe);
        assert!(evaluate(&policy, 9, vec![neighbor(5, VehicleStatus::Requesting)]).is_safe);

        let lower_first = SerialPolicy::new(TieBreak::LowerIdFirst);
        assert!(evaluate(&lower_first, 5, vec![neighbor(9, VehicleStatus::Requesting)]).is_safe);
    }

    #[test]
    fn idle_and_exiting_neighbors_are_ignored() {
        let state = evaluate(
            &SerialPolicy::default(),
            1,
            vec![neighbor(7, VehicleStatus::Idle), neighbor(8, VehicleStatus::Exiting)],
        );
        assert!(state.is_safe);
    }
}
