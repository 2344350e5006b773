//! Per-vehicle control state machine.
//!
//! [`ClientDaemon`] is synchronous and owns everything it touches: the
//! neighbor table, the outgoing beacon, the admission policy and the motion
//! actuator. Time is always passed in, so the same code runs under the async
//! [`DaemonRunner`](crate::DaemonRunner) and the deterministic
//! [`Simulation`](crate::Simulation).
//!
//! # Cycle
//!
//! ```text
//! tick(now):
//!   flush stale neighbors
//!   run a due post-exit pause
//!   if requesting and not yet granted:
//!     state = policy.is_safe_to_cross()
//!     safe now                      -> commit
//!     safe later, concrete time     -> wait for that time
//!     safe, no time                 -> commit after MIN_SAFE_DURATION of
//!                                      uninterrupted positive reads
//!     not safe                      -> reset the debounce window
//! ```

use crossroads_admission::{build_policy, AdmissionPolicy, Evaluation, PolicyKind, SafeState};
use crossroads_beacon::{
    Beacon, NeighborTable, Timestamp, UpdateOutcome, VehicleId, VehicleStatus,
};
use crossroads_topology::ConflictDetector;
use tracing::{debug, info, warn};

use crate::actuator::MotionActuator;
use crate::config::ClientConfig;
use crate::detector::IntersectionEvent;
use crate::error::{Error, Result};
use crate::pacing::SpeedPacer;

/// Where the vehicle is relative to the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No crossing in progress.
    Idle,
    /// Between the approach marker and the entrance.
    Approaching,
    /// At the entrance.
    Entering,
    /// Past the exit marker. `pause_at` is the pending post-exit pause.
    Exiting { pause_at: Option<Timestamp> },
    /// Stopped after a detector error.
    Aborted,
}

/// Outcome of one admission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Waiting,
    /// Positive, but not yet committed.
    Provisional { since: Timestamp, safe_at: Timestamp },
    Committed,
}

/// The control loop of one vehicle.
pub struct ClientDaemon<A> {
    config: ClientConfig,
    policy: Box<dyn AdmissionPolicy>,
    neighbors: NeighborTable,
    beacon: Beacon,
    actuator: A,
    pacer: SpeedPacer,
    phase: Phase,
    access_granted: bool,
    provisional_since: Option<Timestamp>,
    last_state: Option<SafeState>,
    running: bool,
}

impl<A: MotionActuator> ClientDaemon<A> {
    /// Build a daemon running the policy named in `config`.
    pub fn new<C>(config: ClientConfig, detector: C, actuator: A) -> Result<Self>
    where
        C: ConflictDetector + 'static,
    {
        config.validate()?;
        let policy = build_policy(config.policy, detector, config.policy_options());
        Ok(Self::with_policy(config, policy, actuator))
    }

    /// Build a daemon around an already assembled policy.
    pub fn with_policy(config: ClientConfig, policy: Box<dyn AdmissionPolicy>, actuator: A) -> Self {
        let kind = policy.kind();
        let mut beacon = Beacon::new(config.vehicle_id, kind, config.route.clone());
        if kind == PolicyKind::Reservation {
            beacon = beacon.with_crossing_duration(config.crossing_duration.as_millis() as u64);
        }
        Self {
            neighbors: NeighborTable::new(config.vehicle_id),
            pacer: SpeedPacer::new(config.max_speed, config.distance_to_entrance),
            config,
            policy,
            beacon,
            actuator,
            phase: Phase::Idle,
            access_granted: false,
            provisional_since: None,
            last_state: None,
            running: true,
        }
    }

    /// Handle a detector event.
    ///
    /// Returns [`Error::Aborted`] on [`IntersectionEvent::Error`]; the daemon
    /// is stopped afterwards and ignores further input.
    pub fn on_event(&mut self, event: IntersectionEvent, now: Timestamp) -> Result<()> {
        if !self.running {
            debug!(vehicle = %self.vehicle_id(), %event, "daemon stopped, ignoring event");
            return Ok(());
        }
        info!(vehicle = %self.vehicle_id(), %event, status = %self.status(), "detector event");

        match event {
            IntersectionEvent::Approaching => match self.phase {
                Phase::Approaching | Phase::Entering => {
                    debug!(vehicle = %self.vehicle_id(), "already approaching");
                }
                _ => self.begin_episode(),
            },
            IntersectionEvent::Entering => {
                if matches!(self.phase, Phase::Idle | Phase::Exiting { .. }) {
                    warn!(vehicle = %self.vehicle_id(), "entrance reached without approach, requesting now");
                    self.begin_episode();
                }
                self.phase = Phase::Entering;
                if !self.access_granted {
                    info!(vehicle = %self.vehicle_id(), "waiting at entrance");
                    self.actuator.pause();
                }
            }
            IntersectionEvent::Exiting => {
                if !self.access_granted {
                    warn!(vehicle = %self.vehicle_id(), "exit marker passed without access");
                }
                self.beacon.status = VehicleStatus::Exiting;
                self.provisional_since = None;
                self.phase = Phase::Exiting {
                    pause_at: Some(now.plus_millis(self.config.exit_grace.as_millis() as u64)),
                };
            }
            IntersectionEvent::Error => {
                warn!(vehicle = %self.vehicle_id(), status = %self.status(), "detector error, stopping");
                self.actuator.stop();
                self.running = false;
                self.phase = Phase::Aborted;
                return Err(Error::Aborted(format!(
                    "{} reported a detector error while {}",
                    self.vehicle_id(),
                    self.status()
                )));
            }
        }
        Ok(())
    }

    /// Fold in a received beacon. Foreign beacons are discarded.
    pub fn on_beacon(&mut self, beacon: Beacon, now: Timestamp) -> Option<UpdateOutcome> {
        if beacon.protocol != self.beacon.protocol {
            warn!(
                vehicle = %self.vehicle_id(),
                from = %beacon.sender,
                protocol = %beacon.protocol,
                "discarding foreign beacon"
            );
            return None;
        }
        Some(self.neighbors.update(beacon, now))
    }

    /// Report distance travelled toward the entrance.
    pub fn record_progress(&mut self, meters: f64) {
        if self.phase == Phase::Approaching {
            self.pacer.advance(meters);
        }
    }

    /// Run one decision cycle.
    ///
    /// Returns the admission decision when one was evaluated.
    pub fn tick(&mut self, now: Timestamp) -> Option<Decision> {
        if !self.running {
            return None;
        }

        let max_age = u64::try_from(self.config.max_neighbor_age().as_millis()).unwrap_or(u64::MAX);
        let evicted = self.neighbors.flush_stale(max_age, now);
        if !evicted.is_empty() {
            debug!(vehicle = %self.vehicle_id(), ?evicted, "flushed stale neighbors");
        }

        if let Phase::Exiting { pause_at: Some(at) } = self.phase {
            if now >= at {
                info!(vehicle = %self.vehicle_id(), "exit cleared, pausing");
                self.actuator.pause();
                self.phase = Phase::Exiting { pause_at: None };
            }
        }

        if self.access_granted || !matches!(self.phase, Phase::Approaching | Phase::Entering) {
            return None;
        }
        Some(self.evaluate(now))
    }

    fn evaluate(&mut self, now: Timestamp) -> Decision {
        let snapshot = self.neighbors.snapshot();
        let eval = Evaluation::new(self.config.vehicle_id, &self.config.route, &snapshot, now);
        let state = self.policy.is_safe_to_cross(&eval);
        self.last_state = Some(state);
        debug!(
            vehicle = %self.vehicle_id(),
            %state,
            neighbors = %self.neighbors.stats(),
            "admission evaluated"
        );

        let decision = if state.is_immediate(now) {
            Decision::Committed
        } else if state.is_safe {
            let since = *self.provisional_since.get_or_insert(now);
            let held = now.saturating_since(since);
            if !state.safe_at.is_scheduled() && held >= self.config.min_safe_duration.as_millis() as u64 {
                Decision::Committed
            } else {
                Decision::Provisional {
                    since,
                    safe_at: state.safe_at,
                }
            }
        } else {
            if self.provisional_since.take().is_some() {
                debug!(vehicle = %self.vehicle_id(), "negative read, debounce window reset");
            }
            Decision::Waiting
        };

        if decision == Decision::Committed {
            self.commit(now);
        } else if self.is_reservation() {
            self.beacon.entry_time = state.scheduled_time();
            if self.phase == Phase::Approaching {
                if let Some(speed) = self.pacer.next_command(state.scheduled_time(), now) {
                    debug!(vehicle = %self.vehicle_id(), speed, "pacing toward reservation");
                    self.actuator.set_max_speed(speed);
                }
            }
        }
        decision
    }

    fn commit(&mut self, now: Timestamp) {
        self.access_granted = true;
        self.provisional_since = None;
        self.beacon.status = VehicleStatus::Crossing;
        if self.is_reservation() {
            self.beacon.entry_time = Some(now);
            let max = self.pacer.max_speed();
            self.pacer.note_issued(max);
            self.actuator.set_max_speed(max);
        }
        self.actuator.unpause();
        info!(vehicle = %self.vehicle_id(), route = %self.config.route, at = %now, "access granted, crossing");
    }

    fn begin_episode(&mut self) {
        self.phase = Phase::Approaching;
        self.access_granted = false;
        self.provisional_since = None;
        self.last_state = None;
        self.beacon.status = VehicleStatus::Requesting;
        self.beacon.entry_time = None;
        self.pacer.reset(self.config.distance_to_entrance);
    }

    fn is_reservation(&self) -> bool {
        self.beacon.protocol == PolicyKind::Reservation
    }

    pub fn vehicle_id(&self) -> VehicleId {
        self.config.vehicle_id
    }

    pub fn status(&self) -> VehicleStatus {
        self.beacon.status
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The beacon to broadcast next.
    pub fn beacon(&self) -> &Beacon {
        &self.beacon
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn access_granted(&self) -> bool {
        self.access_granted
    }

    pub fn last_state(&self) -> Option<SafeState> {
        self.last_state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{MotionCommand, RecordingActuator};
    use crossroads_beacon::Route;
    use crossroads_topology::presets;
    use proptest::prelude::*;
    use std::time::Duration;

    fn daemon(id: u8, policy: PolicyKind, route: Route) -> (ClientDaemon<RecordingActuator>, RecordingActuator) {
        let actuator = RecordingActuator::new(0.75);
        let config = ClientConfig::new(VehicleId(id), policy, route);
        let daemon = ClientDaemon::new(config, presets::two_lane_four_way(), actuator.clone()).unwrap();
        (daemon, actuator)
    }

    fn peer(id: u8, policy: PolicyKind, status: VehicleStatus, route: Route, seq: u64) -> Beacon {
        Beacon::new(VehicleId(id), policy, route)
            .with_status(status)
            .with_sequence(seq)
    }

    #[test]
    fn approaching_starts_requesting() {
        let (mut d, _) = daemon(5, PolicyKind::Serial, Route::new("N", "S"));
        assert_eq!(d.status(), VehicleStatus::Idle);
        assert_eq!(d.tick(Timestamp(0)), None);

        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        assert_eq!(d.status(), VehicleStatus::Requesting);
        assert_eq!(d.phase(), Phase::Approaching);
    }

    #[test]
    fn serial_commit_waits_out_debounce() {
        let (mut d, actuator) = daemon(5, PolicyKind::Serial, Route::new("N", "S"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();

        for t in [0, 500, 1_000, 1_500, 2_000] {
            let decision = d.tick(Timestamp(t)).unwrap();
            assert!(matches!(decision, Decision::Provisional { since: Timestamp(0), .. }));
            assert!(!d.access_granted());
        }
        assert_eq!(d.tick(Timestamp(2_500)), Some(Decision::Committed));
        assert_eq!(d.status(), VehicleStatus::Crossing);
        assert_eq!(actuator.commands(), vec![MotionCommand::Unpause]);

        // Granted vehicles stop evaluating.
        assert_eq!(d.tick(Timestamp(3_000)), None);
    }

    #[test]
    fn negative_read_restarts_debounce() {
        let (mut d, _) = daemon(5, PolicyKind::Serial, Route::new("N", "S"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        d.tick(Timestamp(0));
        d.tick(Timestamp(1_500));

        let route = Route::new("E", "W");
        d.on_beacon(peer(2, PolicyKind::Serial, VehicleStatus::Crossing, route.clone(), 1), Timestamp(1_900));
        assert_eq!(d.tick(Timestamp(2_000)), Some(Decision::Waiting));

        d.on_beacon(peer(2, PolicyKind::Serial, VehicleStatus::Exiting, route, 2), Timestamp(2_400));
        assert!(matches!(
            d.tick(Timestamp(2_500)),
            Some(Decision::Provisional { since: Timestamp(2_500), .. })
        ));
        assert!(!matches!(d.tick(Timestamp(4_500)), Some(Decision::Committed)));
        assert_eq!(d.tick(Timestamp(4_600)), Some(Decision::Committed));
    }

    #[test]
    fn entering_without_access_pauses_until_granted() {
        let (mut d, actuator) = daemon(5, PolicyKind::Serial, Route::new("N", "S"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        d.tick(Timestamp(0));
        d.on_event(IntersectionEvent::Entering, Timestamp(400)).unwrap();
        assert!(!actuator.state().is_moving());

        d.tick(Timestamp(2_100));
        assert!(actuator.state().is_moving());
        assert_eq!(d.status(), VehicleStatus::Crossing);
    }

    #[test]
    fn exit_pauses_after_grace_period() {
        let (mut d, actuator) = daemon(5, PolicyKind::Serial, Route::new("N", "S"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        d.tick(Timestamp(0));
        d.tick(Timestamp(2_100));
        d.on_event(IntersectionEvent::Exiting, Timestamp(4_000)).unwrap();
        assert_eq!(d.status(), VehicleStatus::Exiting);

        d.tick(Timestamp(4_500));
        assert!(actuator.state().is_moving());
        d.tick(Timestamp(5_000));
        assert!(!actuator.state().is_moving());
        assert_eq!(d.phase(), Phase::Exiting { pause_at: None });
        assert!(d.is_running());
    }

    #[test]
    fn new_approach_after_exit_starts_fresh_episode() {
        let (mut d, _) = daemon(5, PolicyKind::Serial, Route::new("N", "S"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        d.tick(Timestamp(0));
        d.tick(Timestamp(2_100));
        d.on_event(IntersectionEvent::Exiting, Timestamp(4_000)).unwrap();

        d.on_event(IntersectionEvent::Approaching, Timestamp(10_000)).unwrap();
        assert_eq!(d.status(), VehicleStatus::Requesting);
        assert!(!d.access_granted());
        assert!(matches!(d.tick(Timestamp(10_000)), Some(Decision::Provisional { .. })));
    }

    #[test]
    fn detector_error_aborts() {
        let (mut d, actuator) = daemon(5, PolicyKind::Parallel, Route::new("N", "S"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        let err = d.on_event(IntersectionEvent::Error, Timestamp(100)).unwrap_err();

        assert!(matches!(err, Error::Aborted(_)));
        assert!(actuator.state().stopped);
        assert!(!d.is_running());
        assert_eq!(d.phase(), Phase::Aborted);
        assert_eq!(d.tick(Timestamp(5_000)), None);
        assert!(d.on_event(IntersectionEvent::Approaching, Timestamp(6_000)).is_ok());
        assert_eq!(d.phase(), Phase::Aborted);
    }

    #[test]
    fn foreign_beacons_are_discarded() {
        let (mut d, _) = daemon(5, PolicyKind::Parallel, Route::new("N", "S"));
        let foreign = peer(2, PolicyKind::Reservation, VehicleStatus::Crossing, Route::new("E", "W"), 0);
        assert_eq!(d.on_beacon(foreign, Timestamp(0)), None);
        assert!(d.neighbors().is_empty());

        let own = peer(5, PolicyKind::Parallel, VehicleStatus::Crossing, Route::new("E", "W"), 0);
        assert_eq!(d.on_beacon(own, Timestamp(0)), Some(UpdateOutcome::IgnoredSelf));
    }

    #[test]
    fn restarted_peer_is_not_stuck_at_old_status() {
        let (mut d, _) = daemon(5, PolicyKind::Parallel, Route::new("E", "W"));
        let route = Route::new("N", "S");
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        d.on_beacon(peer(7, PolicyKind::Parallel, VehicleStatus::Crossing, route.clone(), 200), Timestamp(0));
        assert_eq!(d.tick(Timestamp(0)), Some(Decision::Waiting));

        // 7 reboots and counts from zero while idle.
        for seq in 0..12 {
            let now = Timestamp(500 + seq * 500);
            d.on_beacon(peer(7, PolicyKind::Parallel, VehicleStatus::Idle, route.clone(), seq), now);
            d.tick(now);
        }
        assert_eq!(d.neighbors().get(VehicleId(7)).unwrap().status(), VehicleStatus::Idle);
        assert!(d.access_granted());
    }

    #[test]
    fn silent_neighbor_stops_blocking() {
        let (mut d, _) = daemon(5, PolicyKind::Parallel, Route::new("N", "S"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        d.on_beacon(
            peer(7, PolicyKind::Parallel, VehicleStatus::Crossing, Route::new("E", "W"), 0),
            Timestamp(0),
        );
        assert_eq!(d.tick(Timestamp(5_000)), Some(Decision::Waiting));
        assert!(matches!(d.tick(Timestamp(5_001)), Some(Decision::Provisional { .. })));
        assert!(!d.neighbors().contains(VehicleId(7)));
    }

    #[test]
    fn parallel_joins_non_conflicting_crossing_vehicle_at_once() {
        let (mut d, _) = daemon(9, PolicyKind::Parallel, Route::new("S", "N"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        d.on_beacon(
            peer(5, PolicyKind::Parallel, VehicleStatus::Crossing, Route::new("N", "S"), 0),
            Timestamp(100),
        );
        assert_eq!(d.tick(Timestamp(500)), Some(Decision::Committed));
    }

    #[test]
    fn reservation_publishes_slot_and_paces() {
        let (mut d, actuator) = daemon(7, PolicyKind::Reservation, Route::new("E", "W"));
        assert_eq!(d.beacon().crossing_duration_ms, Some(4_000));
        d.on_event(IntersectionEvent::Approaching, Timestamp(1_900)).unwrap();

        let occupant = peer(3, PolicyKind::Reservation, VehicleStatus::Crossing, Route::new("N", "S"), 0)
            .with_entry_time(Timestamp(1_000))
            .with_crossing_duration(4_000);
        d.on_beacon(occupant, Timestamp(2_000));

        let decision = d.tick(Timestamp(2_000));
        assert_eq!(
            decision,
            Some(Decision::Provisional {
                since: Timestamp(2_000),
                safe_at: Timestamp(5_000)
            })
        );
        assert_eq!(d.beacon().entry_time, Some(Timestamp(5_000)));
        // 0.36 m over 3 s.
        let speed = actuator.state().max_speed;
        assert!((speed - 0.12).abs() < 1e-9);

        // A concrete slot is never committed early, however long it holds.
        assert!(matches!(d.tick(Timestamp(4_500)), Some(Decision::Provisional { .. })));

        assert_eq!(d.tick(Timestamp(5_000)), Some(Decision::Committed));
        assert_eq!(d.beacon().entry_time, Some(Timestamp(5_000)));
        assert_eq!(d.status(), VehicleStatus::Crossing);
        assert_eq!(actuator.state().max_speed, 0.75);
    }

    #[test]
    fn reservation_clears_slot_on_negative_read() {
        let (mut d, _) = daemon(4, PolicyKind::Reservation, Route::new("S", "N"));
        d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();
        let leader = peer(8, PolicyKind::Reservation, VehicleStatus::Requesting, Route::new("N", "S"), 0)
            .with_entry_time(Timestamp(3_000))
            .with_crossing_duration(4_000);
        d.on_beacon(leader.clone(), Timestamp(0));
        d.tick(Timestamp(100));
        assert_eq!(d.beacon().entry_time, Some(Timestamp(3_000)));

        let mut withdrawn = leader;
        withdrawn.entry_time = None;
        withdrawn.sequence = 1;
        d.on_beacon(withdrawn, Timestamp(200));
        assert_eq!(d.tick(Timestamp(600)), Some(Decision::Waiting));
        assert_eq!(d.beacon().entry_time, None);
    }

    proptest! {
        /// Commit happens exactly when positives have held, unbroken, for the debounce window.
        #[test]
        fn commit_requires_uninterrupted_positive_window(reads in proptest::collection::vec(any::<bool>(), 1..40)) {
            let actuator = RecordingActuator::new(0.75);
            let config = ClientConfig::new(VehicleId(1), PolicyKind::Serial, Route::new("N", "S"))
                .with_min_safe_duration(Duration::from_millis(2_100));
            let mut d = ClientDaemon::new(config, presets::two_lane_four_way(), actuator).unwrap();
            d.on_event(IntersectionEvent::Approaching, Timestamp(0)).unwrap();

            let mut run_start: Option<u64> = None;
            let mut expected_commit = false;
            for (i, positive) in reads.into_iter().enumerate() {
                let now = i as u64 * 500;
                // A requesting vehicle 200 outranks vehicle 1; idle it does not.
                let status = if positive { VehicleStatus::Idle } else { VehicleStatus::Requesting };
                d.on_beacon(peer(200, PolicyKind::Serial, status, Route::new("E", "W"), i as u64), Timestamp(now));
                d.tick(Timestamp(now));

                if positive {
                    let start = *run_start.get_or_insert(now);
                    if now - start >= 2_100 {
                        expected_commit = true;
                    }
                } else {
                    run_start = None;
                }
                prop_assert_eq!(d.access_granted(), expected_commit);
                if expected_commit {
                    break;
                }
            }
        }
    }
}
