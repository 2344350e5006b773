//! Client configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crossroads_admission::{PolicyKind, PolicyOptions, SlotStrategy, TieBreak};
use crossroads_beacon::{Route, VehicleId};
use crossroads_topology::{presets, IntersectionTopology};

use crate::error::{Error, Result};

/// Tunables for one vehicle client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Identity, and tie-break key.
    pub vehicle_id: VehicleId,

    /// Admission protocol variant.
    pub policy: PolicyKind,

    /// Route this vehicle takes through the intersection.
    pub route: Route,

    /// Lower bound of the randomized beacon period.
    pub min_beacon_period: Duration,

    /// Upper bound of the randomized beacon period.
    pub max_beacon_period: Duration,

    /// Peers silent for this many max beacon periods are evicted.
    pub max_lost_beacons: u32,

    /// How long a provisional "safe" must hold before committing.
    pub min_safe_duration: Duration,

    /// Decision cycle period.
    pub cycle_time: Duration,

    /// Estimated time to cross, published in reservation beacons.
    pub crossing_duration: Duration,

    /// Time to keep moving after EXITING before pausing.
    pub exit_grace: Duration,

    /// Distance from the approach marker to the entrance, in meters.
    pub distance_to_entrance: f64,

    /// Platform maximum speed, in meters per second.
    pub max_speed: f64,

    pub tie_break: TieBreak,
    pub slot_selection: SlotStrategy,

    /// JSON topology table. The built-in four-way preset when unset.
    pub topology_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            vehicle_id: VehicleId(1),
            policy: PolicyKind::Parallel,
            route: Route::new("N", "S"),
            min_beacon_period: Duration::from_millis(100),
            max_beacon_period: Duration::from_millis(1_000),
            max_lost_beacons: 5,
            min_safe_duration: Duration::from_millis(2_100),
            cycle_time: Duration::from_millis(500),
            crossing_duration: Duration::from_millis(4_000),
            exit_grace: Duration::from_millis(1_000),
            distance_to_entrance: 0.36,
            max_speed: 0.75,
            tie_break: TieBreak::default(),
            slot_selection: SlotStrategy::default(),
            topology_path: None,
        }
    }
}

impl ClientConfig {
    /// Defaults for a vehicle with the given identity and route.
    pub fn new(vehicle_id: VehicleId, policy: PolicyKind, route: Route) -> Self {
        Self {
            vehicle_id,
            policy,
            route,
            ..Default::default()
        }
    }

    /// Read `CROSSROADS_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(id) = parsed::<u8>(&lookup, "CROSSROADS_VEHICLE_ID")? {
            config.vehicle_id = VehicleId(id);
        }
        if let Some(policy) = lookup("CROSSROADS_POLICY") {
            config.policy = policy.parse().map_err(|e| Error::Config(format!("CROSSROADS_POLICY: {e}")))?;
        }
        let entry = lookup("CROSSROADS_ENTRY");
        let exit = lookup("CROSSROADS_EXIT");
        match (entry, exit) {
            (Some(entry), Some(exit)) => config.route = Route::new(entry.trim(), exit.trim()),
            (None, None) => {}
            _ => {
                return Err(Error::Config(
                    "CROSSROADS_ENTRY and CROSSROADS_EXIT must be set together".into(),
                ))
            }
        }
        if let Some(ms) = parsed::<u64>(&lookup, "CROSSROADS_MIN_BEACON_MS")? {
            config.min_beacon_period = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64>(&lookup, "CROSSROADS_MAX_BEACON_MS")? {
            config.max_beacon_period = Duration::from_millis(ms);
        }
        if let Some(n) = parsed::<u32>(&lookup, "CROSSROADS_MAX_LOST_BEACONS")? {
            config.max_lost_beacons = n;
        }
        if let Some(ms) = parsed::<u64>(&lookup, "CROSSROADS_MIN_SAFE_MS")? {
            config.min_safe_duration = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64>(&lookup, "CROSSROADS_CYCLE_MS")? {
            config.cycle_time = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64>(&lookup, "CROSSROADS_CROSSING_MS")? {
            config.crossing_duration = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64>(&lookup, "CROSSROADS_EXIT_GRACE_MS")? {
            config.exit_grace = Duration::from_millis(ms);
        }
        if let Some(m) = parsed::<f64>(&lookup, "CROSSROADS_DISTANCE_M")? {
            config.distance_to_entrance = m;
        }
        if let Some(speed) = parsed::<f64>(&lookup, "CROSSROADS_MAX_SPEED")? {
            config.max_speed = speed;
        }
        if let Some(tb) = lookup("CROSSROADS_TIE_BREAK") {
            config.tie_break = tb.parse().map_err(|e| Error::Config(format!("CROSSROADS_TIE_BREAK: {e}")))?;
        }
        if let Some(slots) = lookup("CROSSROADS_SLOT_SELECTION") {
            config.slot_selection = slots
                .parse()
                .map_err(|e| Error::Config(format!("CROSSROADS_SLOT_SELECTION: {e}")))?;
        }
        config.topology_path = lookup("CROSSROADS_TOPOLOGY").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.min_beacon_period.is_zero() {
            return Err(Error::Config("min beacon period must be positive".into()));
        }
        if self.min_beacon_period > self.max_beacon_period {
            return Err(Error::Config(format!(
                "min beacon period {:?} exceeds max beacon period {:?}",
                self.min_beacon_period, self.max_beacon_period
            )));
        }
        if self.max_lost_beacons == 0 {
            return Err(Error::Config("max lost beacons must be at least 1".into()));
        }
        let max_age = self
            .max_beacon_period
            .checked_mul(self.max_lost_beacons)
            .filter(|age| u64::try_from(age.as_millis()).is_ok());
        if max_age.is_none() {
            return Err(Error::Config(format!(
                "eviction threshold {:?} x {} overflows",
                self.max_beacon_period, self.max_lost_beacons
            )));
        }
        if self.cycle_time.is_zero() {
            return Err(Error::Config("cycle time must be positive".into()));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(Error::Config(format!("invalid max speed {}", self.max_speed)));
        }
        if !(self.distance_to_entrance.is_finite() && self.distance_to_entrance >= 0.0) {
            return Err(Error::Config(format!(
                "invalid distance to entrance {}",
                self.distance_to_entrance
            )));
        }
        if self.route.entry == self.route.exit {
            return Err(Error::Config(format!("route {} is a u-turn", self.route)));
        }
        Ok(())
    }

    /// Load the configured topology and check the route runs through it.
    pub fn load_topology(&self) -> Result<IntersectionTopology> {
        let topology = match &self.topology_path {
            Some(path) => IntersectionTopology::load(path)?,
            None => presets::two_lane_four_way(),
        };
        if !topology.has_route(&self.route) {
            return Err(Error::Config(format!(
                "route {} is not part of intersection {}",
                self.route,
                topology.name()
            )));
        }
        Ok(topology)
    }

    /// Eviction threshold: `max_lost_beacons * max_beacon_period`.
    pub fn max_neighbor_age(&self) -> Duration {
        self.max_beacon_period
            .checked_mul(self.max_lost_beacons)
            .unwrap_or(Duration::MAX)
    }

    pub fn policy_options(&self) -> PolicyOptions {
        PolicyOptions::default()
            .with_tie_break(self.tie_break)
            .with_slot_selection(self.slot_selection)
    }

    #[must_use]
    pub fn with_vehicle_id(mut self, id: VehicleId) -> Self {
        self.vehicle_id = id;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_beacon_period(mut self, min: Duration, max: Duration) -> Self {
        self.min_beacon_period = min;
        self.max_beacon_period = max;
        self
    }

    #[must_use]
    pub fn with_max_lost_beacons(mut self, n: u32) -> Self {
        self.max_lost_beacons = n;
        self
    }

    #[must_use]
    pub fn with_min_safe_duration(mut self, d: Duration) -> Self {
        self.min_safe_duration = d;
        self
    }

    #[must_use]
    pub fn with_cycle_time(mut self, d: Duration) -> Self {
        self.cycle_time = d;
        self
    }

    #[must_use]
    pub fn with_crossing_duration(mut self, d: Duration) -> Self {
        self.crossing_duration = d;
        self
    }

    #[must_use]
    pub fn with_exit_grace(mut self, d: Duration) -> Self {
        self.exit_grace = d;
        self
    }

    #[must_use]
    pub fn with_distance_to_entrance(mut self, meters: f64) -> Self {
        self.distance_to_entrance = meters;
        self
    }

    #[must_use]
    pub fn with_max_speed(mut self, speed: f64) -> Self {
        self.max_speed = speed;
        self
    }

    #[must_use]
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    #[must_use]
    pub fn with_slot_selection(mut self, slots: SlotStrategy) -> Self {
        self.slot_selection = slots;
        self
    }

    #[must_use]
    pub fn with_topology_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.topology_path = Some(path.into());
        self
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}
