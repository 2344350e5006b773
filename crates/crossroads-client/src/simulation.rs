//! Deterministic multi-vehicle simulation.
//!
//! Several daemons share one [`ManualClock`]. Each vehicle follows a simple
//! kinematic script: it passes the approach marker at its start time, drives
//! toward the entrance at whatever speed its actuator allows, crosses a fixed
//! distance, and passes the exit marker. The simulator plays the detector and
//! the radio, records every CROSSING interval and checks them for overlaps
//! between conflicting routes.

use std::sync::Arc;
use std::time::Duration;

use crossroads_admission::PolicyKind;
use crossroads_beacon::{Route, Timestamp, VehicleId, VehicleStatus};
use crossroads_topology::{ConflictDetector, IntersectionTopology};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actuator::RecordingActuator;
use crate::clock::{Clock, ManualClock};
use crate::config::ClientConfig;
use crate::daemon::ClientDaemon;
use crate::detector::IntersectionEvent;
use crate::error::{Error, Result};

/// How beacons travel between simulated vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Delivery {
    /// Every vehicle's beacon reaches everyone right after it acts.
    Immediate,
    /// Jittered periodic broadcast; each copy is lost with `loss_rate`.
    Periodic { loss_rate: f64 },
}

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Seed for beacon jitter and loss
    pub seed: u64,
    pub delivery: Delivery,
    /// Physics resolution
    pub step: Duration,
    /// Give up after this much simulated time
    pub horizon: Duration,
    /// Template for every vehicle's client; id and route come from the script.
    pub client: ClientConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            delivery: Delivery::Immediate,
            step: Duration::from_millis(100),
            horizon: Duration::from_secs(120),
            client: ClientConfig::default(),
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.client.policy = policy;
        self
    }

    #[must_use]
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// One scripted vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleScript {
    pub id: VehicleId,
    pub route: Route,
    /// When the approach marker is passed.
    pub start_ms: u64,
    /// Distance from entrance to exit marker, in meters.
    #[serde(default = "default_crossing_distance")]
    pub crossing_distance: f64,
}

fn default_crossing_distance() -> f64 {
    1.5
}

impl VehicleScript {
    pub fn new(id: u8, route: Route, start_ms: u64) -> Self {
        Self {
            id: VehicleId(id),
            route,
            start_ms,
            crossing_distance: default_crossing_distance(),
        }
    }
}

/// A list of vehicles to run, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub vehicles: Vec<VehicleScript>,
}

impl Scenario {
    /// One straight-through vehicle from each side, staggered by 200 ms.
    pub fn four_way_rush() -> Self {
        Self {
            vehicles: vec![
                VehicleScript::new(11, Route::new("N", "S"), 0),
                VehicleScript::new(12, Route::new("E", "W"), 200),
                VehicleScript::new(13, Route::new("S", "N"), 400),
                VehicleScript::new(14, Route::new("W", "E"), 600),
            ],
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// A closed or still-open time interval, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: u64,
    pub end: Option<u64>,
}

impl Interval {
    fn overlap(&self, other: &Interval, horizon: u64) -> Option<(u64, u64)> {
        let start = self.start.max(other.start);
        let end = self.end.unwrap_or(horizon).min(other.end.unwrap_or(horizon));
        (start < end).then_some((start, end))
    }
}

/// Outcome for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleReport {
    pub id: VehicleId,
    pub route: Route,
    pub started_at: Option<u64>,
    pub crossing: Option<Interval>,
    pub finished: bool,
}

/// Two conflicting vehicles were CROSSING at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub first: VehicleId,
    pub second: VehicleId,
    pub from: u64,
    pub until: u64,
}

/// Result of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub policy: PolicyKind,
    pub seed: u64,
    pub elapsed_ms: u64,
    pub vehicles: Vec<VehicleReport>,
    pub violations: Vec<Violation>,
    pub beacons_sent: u64,
    pub beacons_lost: u64,
}

impl SimulationReport {
    pub fn all_finished(&self) -> bool {
        self.vehicles.iter().all(|v| v.finished)
    }

    pub fn is_safe(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Parked,
    Approaching { remaining: f64 },
    Inside { crossed: f64 },
    Done,
}

struct SimVehicle {
    script: VehicleScript,
    daemon: ClientDaemon<RecordingActuator>,
    actuator: RecordingActuator,
    stage: Stage,
    sequence: u64,
    next_beacon_at: u64,
    started_at: Option<u64>,
    crossing: Option<Interval>,
}

/// Drives scripted vehicles through one intersection.
pub struct Simulation {
    config: SimulationConfig,
    topology: Arc<IntersectionTopology>,
    clock: ManualClock,
    rng: StdRng,
    vehicles: Vec<SimVehicle>,
    epoch: u64,
    beacons_sent: u64,
    beacons_lost: u64,
}

impl Simulation {
    pub fn new(config: SimulationConfig, topology: IntersectionTopology) -> Result<Self> {
        if config.step.is_zero() {
            return Err(Error::Config("simulation step must be positive".into()));
        }
        if let Delivery::Periodic { loss_rate } = config.delivery {
            if !(0.0..=1.0).contains(&loss_rate) {
                return Err(Error::Config(format!("loss rate {loss_rate} outside [0, 1]")));
            }
        }
        config.client.validate()?;

        let epoch = 0;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            clock: ManualClock::new(Timestamp(epoch)),
            topology: Arc::new(topology),
            config,
            vehicles: Vec::new(),
            epoch,
            beacons_sent: 0,
            beacons_lost: 0,
        })
    }

    /// Add a scripted vehicle. Ids must be unique.
    pub fn add_vehicle(&mut self, script: VehicleScript) -> Result<()> {
        if self.vehicles.iter().any(|v| v.script.id == script.id) {
            return Err(Error::Config(format!("duplicate vehicle {}", script.id)));
        }
        if !self.topology.has_route(&script.route) {
            return Err(Error::Config(format!(
                "route {} is not part of intersection {}",
                script.route,
                self.topology.name()
            )));
        }

        let config = self
            .config
            .client
            .clone()
            .with_vehicle_id(script.id)
            .with_route(script.route.clone());
        let actuator = RecordingActuator::new(config.max_speed);
        let daemon = ClientDaemon::new(config, Arc::clone(&self.topology), actuator.clone())?;

        self.vehicles.push(SimVehicle {
            script,
            daemon,
            actuator,
            stage: Stage::Parked,
            sequence: 0,
            next_beacon_at: 0,
            started_at: None,
            crossing: None,
        });
        // Ascending id order, so each step acts in a fixed order.
        self.vehicles.sort_by_key(|v| v.script.id);
        Ok(())
    }

    /// Add every vehicle of a scenario.
    pub fn add_scenario(&mut self, scenario: Scenario) -> Result<()> {
        for script in scenario.vehicles {
            self.add_vehicle(script)?;
        }
        Ok(())
    }

    /// Run until every vehicle is through or the horizon is reached.
    pub fn run(&mut self) -> Result<SimulationReport> {
        let horizon = self.epoch + self.config.horizon.as_millis() as u64;
        info!(
            policy = %self.config.client.policy,
            vehicles = self.vehicles.len(),
            delivery = ?self.config.delivery,
            "simulation starting"
        );

        while self.clock.now().as_millis() <= horizon {
            self.step()?;
            if self.vehicles.iter().all(|v| v.stage == Stage::Done) {
                break;
            }
            self.clock.advance(self.config.step);
        }

        let report = self.report();
        if report.is_safe() {
            info!(elapsed_ms = report.elapsed_ms, finished = report.all_finished(), "simulation complete");
        } else {
            warn!(violations = report.violations.len(), "mutual exclusion violated");
        }
        Ok(report)
    }

    /// Advance every vehicle by one step at the current time.
    pub fn step(&mut self) -> Result<()> {
        let now = self.clock.now();
        let elapsed = now.as_millis() - self.epoch;
        let step_ms = self.config.step.as_millis() as u64;
        let cycle_ms = self.config.client.cycle_time.as_millis() as u64;
        let tick_due = elapsed % cycle_ms < step_ms;

        for i in 0..self.vehicles.len() {
            self.advance_vehicle(i, now, tick_due)?;
            self.deliver_from(i, now);
        }
        Ok(())
    }

    fn advance_vehicle(&mut self, i: usize, now: Timestamp, tick_due: bool) -> Result<()> {
        let step_s = self.config.step.as_secs_f64();
        let distance_to_entrance = self.config.client.distance_to_entrance;
        let vehicle = &mut self.vehicles[i];

        // Movement over the step that just ended.
        let motion = vehicle.actuator.state();
        let travelled = if motion.is_moving() { motion.max_speed * step_s } else { 0.0 };
        match vehicle.stage {
            Stage::Approaching { remaining } if travelled > 0.0 => {
                vehicle.daemon.record_progress(travelled);
                let remaining = remaining - travelled;
                if remaining <= 0.0 {
                    vehicle.stage = Stage::Inside { crossed: -remaining };
                    vehicle.daemon.on_event(IntersectionEvent::Entering, now)?;
                } else {
                    vehicle.stage = Stage::Approaching { remaining };
                }
            }
            Stage::Inside { crossed } if travelled > 0.0 => {
                let crossed = crossed + travelled;
                if crossed >= vehicle.script.crossing_distance {
                    vehicle.stage = Stage::Done;
                    vehicle.daemon.on_event(IntersectionEvent::Exiting, now)?;
                    if let Some(interval) = vehicle.crossing.as_mut() {
                        interval.end = Some(now.as_millis());
                    }
                    debug!(vehicle = %vehicle.script.id, at = %now, "exited");
                } else {
                    vehicle.stage = Stage::Inside { crossed };
                }
            }
            _ => {}
        }

        if vehicle.stage == Stage::Parked && now.as_millis() >= self.epoch + vehicle.script.start_ms {
            vehicle.stage = Stage::Approaching {
                remaining: distance_to_entrance,
            };
            vehicle.started_at = Some(now.as_millis());
            vehicle.daemon.on_event(IntersectionEvent::Approaching, now)?;
        }

        if tick_due {
            vehicle.daemon.tick(now);
        }

        if vehicle.crossing.is_none() && vehicle.daemon.status() == VehicleStatus::Crossing {
            vehicle.crossing = Some(Interval {
                start: now.as_millis(),
                end: None,
            });
        }
        Ok(())
    }

    fn deliver_from(&mut self, i: usize, now: Timestamp) {
        let sender = &mut self.vehicles[i];
        if sender.started_at.is_none() {
            return;
        }
        let loss_rate = match self.config.delivery {
            Delivery::Immediate => 0.0,
            Delivery::Periodic { loss_rate } => {
                if now.as_millis() < sender.next_beacon_at {
                    return;
                }
                let min = self.config.client.min_beacon_period.as_millis() as u64;
                let max = self.config.client.max_beacon_period.as_millis() as u64;
                sender.next_beacon_at = now.as_millis() + self.rng.gen_range(min..=max);
                loss_rate
            }
        };

        let mut beacon = sender.daemon.beacon().clone();
        beacon.sequence = sender.sequence;
        sender.sequence += 1;

        for (j, receiver) in self.vehicles.iter_mut().enumerate() {
            if j == i {
                continue;
            }
            self.beacons_sent += 1;
            if loss_rate > 0.0 && self.rng.gen_bool(loss_rate) {
                self.beacons_lost += 1;
                continue;
            }
            receiver.daemon.on_beacon(beacon.clone(), now);
        }
    }

    fn report(&self) -> SimulationReport {
        let now = self.clock.now().as_millis();
        let mut violations = Vec::new();
        for (i, a) in self.vehicles.iter().enumerate() {
            for b in &self.vehicles[i + 1..] {
                let (Some(ia), Some(ib)) = (a.crossing, b.crossing) else {
                    continue;
                };
                if !self.topology.conflicts(&a.script.route, &b.script.route) {
                    continue;
                }
                if let Some((from, until)) = ia.overlap(&ib, now + 1) {
                    violations.push(Violation {
                        first: a.script.id,
                        second: b.script.id,
                        from,
                        until,
                    });
                }
            }
        }

        SimulationReport {
            policy: self.config.client.policy,
            seed: self.config.seed,
            elapsed_ms: now - self.epoch,
            vehicles: self
                .vehicles
                .iter()
                .map(|v| VehicleReport {
                    id: v.script.id,
                    route: v.script.route.clone(),
                    started_at: v.started_at,
                    crossing: v.crossing,
                    finished: v.stage == Stage::Done,
                })
                .collect(),
            violations,
            beacons_sent: self.beacons_sent,
            beacons_lost: self.beacons_lost,
        }
    }
}
