//! The conflict relation between routes.
//!
//! Conflicts are stored as an unordered set of route pairs. Every declared
//! pair is inserted in both orders so that [`IntersectionTopology::conflicts`]
//! is symmetric without any normalisation at query time.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::error::{Result, TopologyError};
use crate::lane::{LaneId, Route};

/// Answers whether two routes through the intersection physically conflict.
///
/// Implementations must be symmetric: `conflicts(a, b) == conflicts(b, a)`.
pub trait ConflictDetector: Send + Sync {
    /// Whether vehicles on `a` and `b` may not occupy the intersection together.
    fn conflicts(&self, a: &Route, b: &Route) -> bool;

    /// Lane-wise form of [`conflicts`](Self::conflicts).
    fn conflicts_lanes(
        &self,
        entry_a: &LaneId,
        exit_a: &LaneId,
        entry_b: &LaneId,
        exit_b: &LaneId,
    ) -> bool {
        let a = Route {
            entry: entry_a.clone(),
            exit: exit_a.clone(),
        };
        let b = Route {
            entry: entry_b.clone(),
            exit: exit_b.clone(),
        };
        self.conflicts(&a, &b)
    }
}

impl<T: ConflictDetector + ?Sized> ConflictDetector for Arc<T> {
    fn conflicts(&self, a: &Route, b: &Route) -> bool {
        (**self).conflicts(a, b)
    }
}

impl<T: ConflictDetector + ?Sized> ConflictDetector for &T {
    fn conflicts(&self, a: &Route, b: &Route) -> bool {
        (**self).conflicts(a, b)
    }
}

/// Static intersection description: declared lanes plus the conflict table.
#[derive(Debug, Clone)]
pub struct IntersectionTopology {
    name: String,
    lanes: BTreeSet<LaneId>,
    conflicts: HashSet<(Route, Route)>,
}

impl IntersectionTopology {
    /// Start building a topology with the given name.
    pub fn builder(name: impl Into<String>) -> TopologyBuilder {
        TopologyBuilder {
            name: name.into(),
            lanes: BTreeSet::new(),
            conflicts: Vec::new(),
        }
    }

    /// Name of the intersection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All declared lanes, in order.
    pub fn lanes(&self) -> impl Iterator<Item = &LaneId> {
        self.lanes.iter()
    }

    /// Whether a lane was declared.
    pub fn has_lane(&self, lane: &LaneId) -> bool {
        self.lanes.contains(lane)
    }

    /// Whether both ends of a route are declared lanes.
    pub fn has_route(&self, route: &Route) -> bool {
        self.has_lane(&route.entry) && self.has_lane(&route.exit)
    }

    /// Number of unordered conflicting pairs (self-conflicts excluded).
    pub fn conflict_count(&self) -> usize {
        self.conflicts.iter().filter(|(a, b)| a < b).count()
    }
}

impl ConflictDetector for IntersectionTopology {
    fn conflicts(&self, a: &Route, b: &Route) -> bool {
        // A route always conflicts with itself.
        a == b || self.conflicts.contains(&(a.clone(), b.clone()))
    }
}

/// Builder for [`IntersectionTopology`].
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    name: String,
    lanes: BTreeSet<LaneId>,
    conflicts: Vec<(Route, Route)>,
}

impl TopologyBuilder {
    /// Declare a lane.
    #[must_use]
    pub fn lane(mut self, lane: impl Into<LaneId>) -> Self {
        self.lanes.insert(lane.into());
        self
    }

    /// Declare several lanes.
    #[must_use]
    pub fn lanes<I, L>(mut self, lanes: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LaneId>,
    {
        self.lanes.extend(lanes.into_iter().map(Into::into));
        self
    }

    /// Declare that two routes conflict.
    #[must_use]
    pub fn conflict(mut self, a: Route, b: Route) -> Self {
        self.conflicts.push((a, b));
        self
    }

    /// Finish the topology, checking every conflict refers to declared lanes.
    pub fn build(self) -> Result<IntersectionTopology> {
        let mut conflicts = HashSet::with_capacity(self.conflicts.len() * 2);
        for (a, b) in self.conflicts {
            for lane in [&a.entry, &a.exit, &b.entry, &b.exit] {
                if !self.lanes.contains(lane) {
                    return Err(TopologyError::UnknownLane(lane.to_string()));
                }
            }
            conflicts.insert((b.clone(), a.clone()));
            conflicts.insert((a, b));
        }

        Ok(IntersectionTopology {
            name: self.name,
            lanes: self.lanes,
            conflicts,
        })
    }
}

/// Serialized topology table.
///
/// ```json
/// {
///   "name": "lab-crossing",
///   "lanes": ["N", "S", "E", "W"],
///   "conflicts": [["N", "S", "E", "W"], ["N", "E", "S", "N"]]
/// }
/// ```
#[cfg(feature = "serde")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopologySpec {
    pub name: String,
    pub lanes: Vec<LaneId>,
    /// Each entry is `[entryA, exitA, entryB, exitB]`.
    pub conflicts: Vec<[LaneId; 4]>,
}

#[cfg(feature = "serde")]
impl TopologySpec {
    /// Build the topology this table describes.
    pub fn into_topology(self) -> Result<IntersectionTopology> {
        let mut seen = BTreeSet::new();
        for lane in &self.lanes {
            if !seen.insert(lane.clone()) {
                return Err(TopologyError::DuplicateLane(lane.to_string()));
            }
        }

        let mut builder = IntersectionTopology::builder(self.name).lanes(self.lanes);
        for [entry_a, exit_a, entry_b, exit_b] in self.conflicts {
            builder = builder.conflict(Route::new(entry_a, exit_a), Route::new(entry_b, exit_b));
        }
        builder.build()
    }
}

#[cfg(feature = "serde")]
impl IntersectionTopology {
    /// Parse a JSON topology table.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let spec: TopologySpec =
            serde_json::from_str(json).map_err(|e| TopologyError::Parse(e.to_string()))?;
        spec.into_topology()
    }

    /// Load a JSON topology table from disk.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
