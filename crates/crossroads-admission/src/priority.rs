//! Total order used to arbitrate between competing vehicles.

use std::fmt;
use std::str::FromStr;

use crossroads_beacon::VehicleId;

use crate::error::ParseOptionError;

/// Which of two vehicles goes first when both want the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TieBreak {
    /// The larger vehicle id wins.
    #[default]
    HigherIdFirst,
    /// The smaller vehicle id wins.
    LowerIdFirst,
}

impl TieBreak {
    /// Does `a` take precedence over `b`?
    ///
    /// Irreflexive and total over distinct ids.
    pub fn outranks(&self, a: VehicleId, b: VehicleId) -> bool {
        match self {
            Self::HigherIdFirst => a > b,
            Self::LowerIdFirst => a < b,
        }
    }

    /// Whether `me` outranks every id in `others`.
    pub fn is_highest(&self, me: VehicleId, others: impl IntoIterator<Item = VehicleId>) -> bool {
        others.into_iter().all(|other| !self.outranks(other, me))
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HigherIdFirst => "higher-id-first",
            Self::LowerIdFirst => "lower-id-first",
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TieBreak {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "higher-id-first" | "higher" => Ok(Self::HigherIdFirst),
            "lower-id-first" | "lower" => Ok(Self::LowerIdFirst),
            other => Err(ParseOptionError::new("tie break", other)),
        }
    }
}
