//! Per-vehicle local view of nearby peers.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, trace};

use crate::beacon::Beacon;
use crate::vehicle::{Timestamp, VehicleId, VehicleStatus};

/// The latest beacon heard from one peer and when it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub vehicle_id: VehicleId,
    pub beacon: Beacon,
    /// Local receipt time of the most recent beacon from this peer.
    pub last_receipt: Timestamp,
}

impl NeighborEntry {
    /// Milliseconds since this peer was last heard.
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_since(self.last_receipt)
    }

    pub fn status(&self) -> VehicleStatus {
        self.beacon.status
    }
}

/// How far behind the stored sequence number a beacon may be and still count
/// as reordered. Anything further back is a restarted sender.
pub const REORDER_WINDOW: u64 = 8;

/// What [`NeighborTable::update`] did with a beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// First beacon from this peer.
    Inserted,
    /// Entry overwritten with newer content.
    Updated,
    /// Out-of-order beacon: liveness refreshed, content kept.
    Refreshed,
    /// The beacon was our own and was dropped.
    IgnoredSelf,
}

/// Neighbor table keyed by vehicle id.
///
/// Exactly one entry per peer. Entries are only ever removed by
/// [`flush_stale`](Self::flush_stale).
#[derive(Debug, Clone)]
pub struct NeighborTable {
    self_id: VehicleId,
    entries: BTreeMap<VehicleId, NeighborEntry>,
}

impl NeighborTable {
    /// Create an empty table owned by `self_id`.
    pub fn new(self_id: VehicleId) -> Self {
        Self {
            self_id,
            entries: BTreeMap::new(),
        }
    }

    pub fn self_id(&self) -> VehicleId {
        self.self_id
    }

    /// Fold a received beacon into the table.
    ///
    /// Our own beacons never create or touch an entry. A beacon up to
    /// [`REORDER_WINDOW`] sequence numbers behind the stored one only refreshes
    /// liveness; one further behind means the sender restarted its counter and
    /// replaces the entry.
    pub fn update(&mut self, beacon: Beacon, now: Timestamp) -> UpdateOutcome {
        let sender = beacon.sender;
        if sender == self.self_id {
            trace!(%sender, "ignoring own beacon");
            return UpdateOutcome::IgnoredSelf;
        }

        match self.entries.get_mut(&sender) {
            Some(existing) => {
                existing.last_receipt = now;
                let behind = existing.beacon.sequence.saturating_sub(beacon.sequence);
                if behind > 0 && behind <= REORDER_WINDOW {
                    trace!(
                        %sender,
                        received = beacon.sequence,
                        stored = existing.beacon.sequence,
                        "stale beacon, refreshed liveness only"
                    );
                    return UpdateOutcome::Refreshed;
                }
                if behind > REORDER_WINDOW {
                    debug!(
                        %sender,
                        received = beacon.sequence,
                        stored = existing.beacon.sequence,
                        "sequence restarted, taking new beacon"
                    );
                }
                if existing.beacon.status != beacon.status {
                    debug!(%sender, from = %existing.beacon.status, to = %beacon.status, "neighbor status changed");
                }
                existing.beacon = beacon;
                UpdateOutcome::Updated
            }
            None => {
                debug!(%sender, status = %beacon.status, route = %beacon.route, "new neighbor");
                self.entries.insert(
                    sender,
                    NeighborEntry {
                        vehicle_id: sender,
                        beacon,
                        last_receipt: now,
                    },
                );
                UpdateOutcome::Inserted
            }
        }
    }

    /// Evict every peer not heard from for more than `max_age_ms`.
    ///
    /// Returns the evicted ids in ascending order.
    pub fn flush_stale(&mut self, max_age_ms: u64, now: Timestamp) -> Vec<VehicleId> {
        let stale: Vec<VehicleId> = self
            .entries
            .values()
            .filter(|e| e.age(now) > max_age_ms)
            .map(|e| e.vehicle_id)
            .collect();

        for id in &stale {
            self.entries.remove(id);
            debug!(vehicle = %id, max_age_ms, "evicted silent neighbor");
        }
        stale
    }

    /// Copy the table for one policy evaluation.
    pub fn snapshot(&self) -> NeighborSnapshot {
        NeighborSnapshot {
            entries: self.entries.values().cloned().collect(),
        }
    }

    pub fn get(&self, id: VehicleId) -> Option<&NeighborEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending vehicle id order.
    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.entries.values()
    }

    /// Count neighbors per status.
    pub fn stats(&self) -> NeighborStats {
        let mut stats = NeighborStats::default();
        for entry in self.entries.values() {
            match entry.status() {
                VehicleStatus::Idle => stats.idle += 1,
                VehicleStatus::Requesting => stats.requesting += 1,
                VehicleStatus::Crossing => stats.crossing += 1,
                VehicleStatus::Exiting => stats.exiting += 1,
            }
        }
        stats
    }
}

/// An immutable copy of the table, sorted by vehicle id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborSnapshot {
    entries: Vec<NeighborEntry>,
}

impl NeighborSnapshot {
    /// Build a snapshot from arbitrary entries (sorted and deduplicated by id,
    /// last one wins).
    pub fn from_entries(entries: impl IntoIterator<Item = NeighborEntry>) -> Self {
        let map: BTreeMap<VehicleId, NeighborEntry> =
            entries.into_iter().map(|e| (e.vehicle_id, e)).collect();
        Self {
            entries: map.into_values().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.entries.iter()
    }

    /// Neighbors currently inside the intersection.
    pub fn crossing(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.with_status(VehicleStatus::Crossing)
    }

    /// Neighbors waiting for access.
    pub fn requesting(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.with_status(VehicleStatus::Requesting)
    }

    fn with_status(&self, status: VehicleStatus) -> impl Iterator<Item = &NeighborEntry> {
        self.entries.iter().filter(move |e| e.status() == status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-status neighbor counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighborStats {
    pub idle: usize,
    pub requesting: usize,
    pub crossing: usize,
    pub exiting: usize,
}

impl NeighborStats {
    pub fn total(&self) -> usize {
        self.idle + self.requesting + self.crossing + self.exiting
    }
}

impl fmt::Display for NeighborStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} neighbors ({} idle, {} requesting, {} crossing, {} exiting)",
            self.total(),
            self.idle,
            self.requesting,
            self.crossing,
            self.exiting
        )
    }
}
