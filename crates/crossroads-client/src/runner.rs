//! Async driver for a [`ClientDaemon`].
//!
//! The runner task is the only owner of the daemon and its neighbor table.
//! Detector events and received beacons arrive over channels, so reception
//! never blocks on a decision cycle and a decision never sees a half-applied
//! beacon.

use std::time::Duration;

use crossroads_beacon::Beacon;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::actuator::MotionActuator;
use crate::broadcaster::BeaconBroadcaster;
use crate::clock::Clock;
use crate::daemon::ClientDaemon;
use crate::detector::IntersectionEvent;
use crate::error::Result;
use crate::transport::{forward_beacons, MemoryBus};

/// Inbound beacons buffered before new ones are dropped.
const INBOX_CAPACITY: usize = 256;

/// Channels for talking to a running daemon.
#[derive(Debug)]
pub struct RunnerHandles {
    /// Detector events. Dropping it ends the run.
    pub events: mpsc::Sender<IntersectionEvent>,
    /// Received beacons. Feed with `try_send`; a full inbox drops.
    pub beacons: mpsc::Sender<Beacon>,
    /// Latest local beacon, for the broadcaster.
    pub published: watch::Receiver<Beacon>,
}

/// Ticks a daemon every cycle and applies events and beacons as they arrive.
pub struct DaemonRunner<A, C> {
    daemon: ClientDaemon<A>,
    clock: C,
    cycle: Duration,
    events: mpsc::Receiver<IntersectionEvent>,
    beacons: mpsc::Receiver<Beacon>,
    published: watch::Sender<Beacon>,
}

impl<A, C> DaemonRunner<A, C>
where
    A: MotionActuator,
    C: Clock,
{
    pub fn new(daemon: ClientDaemon<A>, clock: C) -> (Self, RunnerHandles) {
        let (events_tx, events) = mpsc::channel(16);
        let (beacons_tx, beacons) = mpsc::channel(INBOX_CAPACITY);
        let (published, published_rx) = watch::channel(daemon.beacon().clone());
        let cycle = daemon.config().cycle_time;

        let runner = Self {
            daemon,
            clock,
            cycle,
            events,
            beacons,
            published,
        };
        let handles = RunnerHandles {
            events: events_tx,
            beacons: beacons_tx,
            published: published_rx,
        };
        (runner, handles)
    }

    /// Run until the event channel closes, returning the daemon.
    ///
    /// A detector error stops the vehicle and ends the run with
    /// [`Error::Aborted`](crate::Error::Aborted).
    pub async fn run(mut self) -> Result<ClientDaemon<A>> {
        let mut ticker = tokio::time::interval(self.cycle);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut beacons_open = true;

        info!(vehicle = %self.daemon.vehicle_id(), cycle = ?self.cycle, "daemon running");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.daemon.tick(self.clock.now());
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!(vehicle = %self.daemon.vehicle_id(), "detector gone, stopping");
                        break;
                    };
                    let outcome = self.daemon.on_event(event, self.clock.now());
                    self.publish();
                    outcome?;
                }
                beacon = self.beacons.recv(), if beacons_open => {
                    match beacon {
                        Some(beacon) => {
                            self.daemon.on_beacon(beacon, self.clock.now());
                        }
                        None => beacons_open = false,
                    }
                }
            }
            self.publish();
        }
        Ok(self.daemon)
    }

    fn publish(&self) {
        let latest = self.daemon.beacon();
        self.published.send_if_modified(|current| {
            if current == latest {
                false
            } else {
                *current = latest.clone();
                true
            }
        });
    }
}

/// A vehicle wired onto a [`MemoryBus`].
pub struct VehicleHandle<A> {
    pub events: mpsc::Sender<IntersectionEvent>,
    pub published: watch::Receiver<Beacon>,
    pub daemon: JoinHandle<Result<ClientDaemon<A>>>,
    pub broadcaster: JoinHandle<Result<()>>,
    pub receiver: JoinHandle<Result<()>>,
}

/// Spawn the runner, its broadcaster and its beacon receiver.
pub fn spawn_vehicle<A, C>(daemon: ClientDaemon<A>, clock: C, bus: &MemoryBus) -> Result<VehicleHandle<A>>
where
    A: MotionActuator + 'static,
    C: Clock + 'static,
{
    let (min, max) = (
        daemon.config().min_beacon_period,
        daemon.config().max_beacon_period,
    );
    let frames = bus.subscribe();
    let (runner, handles) = DaemonRunner::new(daemon, clock);
    let broadcaster = BeaconBroadcaster::new(bus.clone(), handles.published.clone(), min, max)?;

    Ok(VehicleHandle {
        events: handles.events,
        published: handles.published,
        daemon: tokio::spawn(runner.run()),
        broadcaster: tokio::spawn(broadcaster.run()),
        receiver: tokio::spawn(forward_beacons(frames, handles.beacons)),
    })
}
