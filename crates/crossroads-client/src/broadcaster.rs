//! Periodic beacon transmission.

use std::time::Duration;

use crossroads_beacon::Beacon;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::transport::BeaconTransport;

/// Rebroadcasts the latest local beacon at a jittered period.
///
/// Each period is drawn uniformly from `[min_period, max_period]` so that
/// vehicles sharing a channel do not stay in lock-step and keep colliding.
/// Every transmission carries a fresh sequence number.
pub struct BeaconBroadcaster<T> {
    transport: T,
    latest: watch::Receiver<Beacon>,
    min_period: Duration,
    max_period: Duration,
    rng: StdRng,
    sequence: u64,
}

impl<T: BeaconTransport> BeaconBroadcaster<T> {
    pub fn new(
        transport: T,
        latest: watch::Receiver<Beacon>,
        min_period: Duration,
        max_period: Duration,
    ) -> Result<Self> {
        if min_period.is_zero() || min_period > max_period {
            return Err(Error::Config(format!(
                "invalid beacon period range {min_period:?}..={max_period:?}"
            )));
        }
        Ok(Self {
            transport,
            latest,
            min_period,
            max_period,
            rng: StdRng::from_entropy(),
            sequence: 0,
        })
    }

    /// Use a fixed seed for the period jitter.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Draw the wait before the next transmission.
    pub fn next_period(&mut self) -> Duration {
        let min = self.min_period.as_millis() as u64;
        let max = self.max_period.as_millis() as u64;
        Duration::from_millis(self.rng.gen_range(min..=max))
    }

    /// Send the current beacon once.
    pub fn broadcast_once(&mut self) -> Result<()> {
        let mut beacon = self.latest.borrow_and_update().clone();
        beacon.sequence = self.sequence;
        self.sequence += 1;
        trace!(%beacon, "broadcasting");
        self.transport.send(&beacon)
    }

    /// Transmit until the daemon drops its beacon publisher.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let period = self.next_period();
            tokio::time::sleep(period).await;
            if self.latest.has_changed().is_err() {
                debug!("beacon publisher gone, broadcaster stopping");
                return Ok(());
            }
            if let Err(e) = self.broadcast_once() {
                warn!(error = %e, "beacon transmission failed");
            }
        }
    }
}
