//! The outcome of one admission evaluation.

use std::fmt;

use crossroads_beacon::Timestamp;

/// Whether, and from when, a vehicle may enter the intersection.
///
/// - `!is_safe`: keep waiting.
/// - `is_safe && now < safe_at`: provisional, must persist before acting.
/// - `is_safe && now >= safe_at`: may commit immediately.
///
/// A provisional state with `safe_at == Timestamp::UNSCHEDULED` carries no
/// concrete time; only the daemon's debounce can turn it into a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeState {
    pub is_safe: bool,
    pub safe_at: Timestamp,
}

impl SafeState {
    /// Not safe: keep waiting.
    pub const fn wait() -> Self {
        Self {
            is_safe: false,
            safe_at: Timestamp::UNSCHEDULED,
        }
    }

    /// Safe in principle, with no concrete entry time.
    pub const fn provisional() -> Self {
        Self {
            is_safe: true,
            safe_at: Timestamp::UNSCHEDULED,
        }
    }

    /// Safe from `at` onwards.
    pub const fn at(at: Timestamp) -> Self {
        Self {
            is_safe: true,
            safe_at: at,
        }
    }

    /// May the vehicle commit right now?
    pub fn is_immediate(&self, now: Timestamp) -> bool {
        self.is_safe && now >= self.safe_at
    }

    /// Positive but not yet actionable.
    pub fn is_provisional(&self, now: Timestamp) -> bool {
        self.is_safe && now < self.safe_at
    }

    /// The concrete entry time, if this state carries one.
    pub fn scheduled_time(&self) -> Option<Timestamp> {
        (self.is_safe && self.safe_at.is_scheduled()).then_some(self.safe_at)
    }
}

impl fmt::Display for SafeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_safe {
            write!(f, "safe at {}", self.safe_at)
        } else {
            write!(f, "not safe")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_is_never_immediate() {
        let state = SafeState::wait();
        assert!(!state.is_immediate(Timestamp(u64::MAX - 1)));
        assert!(!state.is_provisional(Timestamp(0)));
        assert_eq!(state.scheduled_time(), None);
    }

    #[test]
    fn provisional_without_time_never_becomes_immediate() {
        let state = SafeState::provisional();
        assert!(state.is_provisional(Timestamp(1_000_000)));
        assert!(!state.is_immediate(Timestamp(1_000_000)));
        assert_eq!(state.scheduled_time(), None);
    }

    #[test]
    fn scheduled_state_becomes_immediate_at_its_time() {
        let state = SafeState::at(Timestamp(5_000));
        assert!(state.is_provisional(Timestamp(4_999)));
        assert!(state.is_immediate(Timestamp(5_000)));
        assert_eq!(state.scheduled_time(), Some(Timestamp(5_000)));
        assert_eq!(state.to_string(), "safe at 5000ms");
    }
}
