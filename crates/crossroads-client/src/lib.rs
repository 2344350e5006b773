//! Crossroads Vehicle Client
//!
//! Runs one vehicle's side of decentralized intersection admission: it
//! listens to neighbor beacons, evaluates its admission policy every cycle,
//! drives the motion actuator, and keeps its own beacon current for the
//! broadcaster.
//!
//! # Architecture
//!
//! - **Daemon**: synchronous per-vehicle state machine ([`ClientDaemon`])
//! - **Runner**: tokio task ticking the daemon and feeding it events and beacons
//! - **Broadcaster**: jittered periodic beacon transmission
//! - **Transport**: best-effort beacon medium ([`MemoryBus`] in process)
//! - **Simulation**: deterministic multi-vehicle runs on a shared clock
//!
//! # Example
//!
//! ```
//! use crossroads_client::{Delivery, PolicyKind, Scenario, Simulation, SimulationConfig};
//! use crossroads_topology::presets;
//!
//! let config = SimulationConfig::default()
//!     .with_policy(PolicyKind::Parallel)
//!     .with_delivery(Delivery::Immediate);
//! let mut sim = Simulation::new(config, presets::two_lane_four_way()).unwrap();
//! sim.add_scenario(Scenario::four_way_rush()).unwrap();
//!
//! let report = sim.run().unwrap();
//! assert!(report.is_safe());
//! ```

pub mod actuator;
pub mod broadcaster;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod detector;
pub mod error;
pub mod pacing;
pub mod runner;
pub mod simulation;
pub mod transport;

pub use actuator::{MotionActuator, MotionCommand, MotionState, RecordingActuator};
pub use broadcaster::BeaconBroadcaster;
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::ClientConfig;
pub use daemon::{ClientDaemon, Decision, Phase};
pub use detector::IntersectionEvent;
pub use error::{Error, Result};
pub use pacing::SpeedPacer;
pub use runner::{spawn_vehicle, DaemonRunner, RunnerHandles, VehicleHandle};
pub use simulation::{
    Delivery, Interval, Scenario, Simulation, SimulationConfig, SimulationReport, VehicleReport,
    VehicleScript, Violation,
};
pub use transport::{forward_beacons, BeaconTransport, MemoryBus};

pub use crossroads_admission::PolicyKind;
