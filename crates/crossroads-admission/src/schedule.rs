//! Choosing which published reservation to share.
//!
//! A vehicle that is not the top requestor may piggy-back on a higher-priority
//! requestor whose route does not conflict with its own, entering at that
//! requestor's published time. When several qualify, a [`SlotSelection`]
//! picks one. Neither strategy is a globally optimal schedule.

use std::fmt;
use std::str::FromStr;

use crossroads_beacon::NeighborEntry;

use crate::error::ParseOptionError;

/// Picks the reservation to share among eligible candidates.
///
/// Candidates arrive in ascending vehicle id order and all carry an entry time.
pub trait SlotSelection: Send + Sync {
    fn select<'a>(&self, candidates: &[&'a NeighborEntry]) -> Option<&'a NeighborEntry>;
}

/// Take the first eligible candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl SlotSelection for FirstFit {
    fn select<'a>(&self, candidates: &[&'a NeighborEntry]) -> Option<&'a NeighborEntry> {
        candidates.first().copied()
    }
}

/// Take the candidate entering soonest (lowest id on ties).
#[derive(Debug, Clone, Copy, Default)]
pub struct EarliestEntry;

impl SlotSelection for EarliestEntry {
    fn select<'a>(&self, candidates: &[&'a NeighborEntry]) -> Option<&'a NeighborEntry> {
        candidates
            .iter()
            .copied()
            .min_by_key(|entry| entry.beacon.entry_time)
    }
}

/// Runtime-selectable strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SlotStrategy {
    #[default]
    FirstFit,
    EarliestEntry,
}

impl SlotSelection for SlotStrategy {
    fn select<'a>(&self, candidates: &[&'a NeighborEntry]) -> Option<&'a NeighborEntry> {
        match self {
            Self::FirstFit => FirstFit.select(candidates),
            Self::EarliestEntry => EarliestEntry.select(candidates),
        }
    }
}

impl fmt::Display for SlotStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstFit => write!(f, "first-fit"),
            Self::EarliestEntry => write!(f, "earliest-entry"),
        }
    }
}

impl FromStr for SlotStrategy {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-fit" | "firstfit" => Ok(Self::FirstFit),
            "earliest-entry" | "earliest" => Ok(Self::EarliestEntry),
            other => Err(ParseOptionError::new("slot selection", other)),
        }
    }
}
