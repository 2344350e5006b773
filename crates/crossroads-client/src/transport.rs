//! Beacon transport.
//!
//! Delivery is best effort: beacons may be dropped, duplicated or reordered,
//! and nothing here ever waits for a slow receiver.

use crossroads_beacon::Beacon;
use tokio::sync::{broadcast, mpsc};
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// Sends encoded beacons to every vehicle in range.
pub trait BeaconTransport: Send + Sync {
    fn send(&self, beacon: &Beacon) -> Result<()>;
}

/// In-process broadcast medium shared by simulated vehicles.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    tx: broadcast::Sender<Vec<u8>>,
}

impl MemoryBus {
    /// `capacity` frames are buffered per receiver before the oldest are lost.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Listen to everything sent on the bus from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.tx.subscribe()
    }

    /// Put raw bytes on the medium.
    pub fn send_raw(&self, frame: Vec<u8>) {
        // No listeners is not an error on a broadcast medium.
        let _ = self.tx.send(frame);
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl BeaconTransport for MemoryBus {
    fn send(&self, beacon: &Beacon) -> Result<()> {
        let frame = beacon.to_bytes()?;
        self.send_raw(frame);
        Ok(())
    }
}

/// Decode frames from `frames` and hand them to a daemon inbox.
///
/// Undecodable frames are dropped, and so are beacons arriving while the inbox
/// is full. Returns when the medium closes or the inbox is gone.
pub async fn forward_beacons(
    mut frames: broadcast::Receiver<Vec<u8>>,
    inbox: mpsc::Sender<Beacon>,
) -> Result<()> {
    loop {
        let frame = match frames.recv().await {
            Ok(frame) => frame,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "beacon receiver lagged, frames lost");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        };

        let beacon = match Beacon::from_bytes(&frame) {
            Ok(beacon) => beacon,
            Err(e) => {
                warn!(error = %e, len = frame.len(), "dropping malformed beacon");
                continue;
            }
        };

        match inbox.try_send(beacon) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(beacon)) => {
                trace!(from = %beacon.sender, "inbox full, beacon dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                return Err(Error::Transport("daemon inbox closed".into()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossroads_beacon::{PolicyKind, Route, VehicleId, VehicleStatus};

    fn beacon(id: u8) -> Beacon {
        Beacon::new(VehicleId(id), PolicyKind::Serial, Route::new("N", "S"))
            .with_status(VehicleStatus::Requesting)
    }

    #[tokio::test]
    async fn bus_delivers_to_every_subscriber() {
        let bus = MemoryBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.send(&beacon(3)).unwrap();

        for rx in [&mut a, &mut b] {
            let frame = rx.recv().await.unwrap();
            assert_eq!(Beacon::from_bytes(&frame).unwrap(), beacon(3));
        }
    }

    #[tokio::test]
    async fn sending_without_listeners_is_fine() {
        let bus = MemoryBus::new(4);
        tokio_test::assert_ok!(bus.send(&beacon(1)));
    }

    #[tokio::test]
    async fn forwarder_skips_garbage_and_drops_when_full() {
        let bus = MemoryBus::default();
        let (inbox_tx, mut inbox_rx) = mpsc::channel(1);
        let task = tokio::spawn(forward_beacons(bus.subscribe(), inbox_tx));

        bus.send_raw(vec![0xde, 0xad]);
        bus.send(&beacon(2)).unwrap();
        bus.send(&beacon(3)).unwrap();
        drop(bus);

        assert!(task.await.unwrap().is_ok());
        assert_eq!(inbox_rx.recv().await.unwrap().sender, VehicleId(2));
        // Vehicle 3 found the inbox full.
        assert!(inbox_rx.recv().await.is_none());
    }
}
