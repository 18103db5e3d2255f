//! Rank model.

use std::str::FromStr;

use derive_more::{Display, Error};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error as _, Unexpected},
};

/// A user's rank.
///
/// Ranks are bounded between [`Rank::MIN`] (the best rank) and [`Rank::MAX`]
/// (the worst). A `Rank` can never hold a value outside of these bounds.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rank(u8);

impl Rank {
    /// The best rank.
    pub const MIN: Rank = Rank(1);
    /// The worst rank.
    pub const MAX: Rank = Rank(25);
    /// The rank an unranked user is displayed as.
    pub const DEFAULT: Rank = Rank::MAX;

    /// Creates a new, checked `Rank`.
    pub fn new(rank: i64) -> Result<Rank, RankRangeError> {
        if (Rank::MIN.0 as i64..=Rank::MAX.0 as i64).contains(&rank) {
            Ok(Rank(rank as u8))
        } else {
            Err(RankRangeError(rank))
        }
    }

    /// The rank as a number.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Moves the rank one step towards [`Rank::MAX`].
    pub fn increase(self) -> Result<Rank, BoundaryReached> {
        if self < Rank::MAX {
            Ok(Rank(self.0 + 1))
        } else {
            Err(BoundaryReached::Ceiling)
        }
    }

    /// Moves the rank one step towards [`Rank::MIN`].
    pub fn decrease(self) -> Result<Rank, BoundaryReached> {
        if self > Rank::MIN {
            Ok(Rank(self.0 - 1))
        } else {
            Err(BoundaryReached::Floor)
        }
    }

    /// Moves the rank one step in `direction`.
    pub fn step(self, direction: RankDirection) -> Result<Rank, BoundaryReached> {
        match direction {
            RankDirection::Up => self.increase(),
            RankDirection::Down => self.decrease(),
        }
    }

    /// How far the rank is from [`Rank::MAX`], as a percentage.
    ///
    /// Each step is worth 4%, so this ranges from `0` at rank 25 to `96` at
    /// rank 1.
    pub fn progress(self) -> u8 {
        (Rank::MAX.0 - self.0) * 4
    }

    /// The CSS class the rank is displayed with, like `rank_20`.
    pub fn css_class(self) -> String {
        format!("rank_{}", self.0)
    }
}

impl Default for Rank {
    fn default() -> Self {
        Rank::DEFAULT
    }
}

impl From<Rank> for u8 {
    fn from(value: Rank) -> Self {
        value.0
    }
}

impl From<Rank> for i64 {
    fn from(value: Rank) -> Self {
        value.0 as i64
    }
}

impl TryFrom<i64> for Rank {
    type Error = RankRangeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rank::new(value)
    }
}

impl FromStr for Rank {
    type Err = RankParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rank = s.trim().parse::<i64>().map_err(|_| RankParseError::NotANumber)?;

        Rank::new(rank).map_err(RankParseError::OutOfRange)
    }
}

impl<'de> Deserialize<'de> for Rank {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rank = i64::deserialize(deserializer)?;

        Rank::new(rank).map_err(|_| {
            D::Error::invalid_value(Unexpected::Signed(rank), &"a rank between 1 and 25")
        })
    }
}

impl Serialize for Rank {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// The direction to move a rank in.
///
/// "Up" follows the numbers: going up from rank 20 lands on rank 21.
#[derive(Clone, Copy, Debug, Display, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RankDirection {
    #[display("up")]
    Up,
    #[display("down")]
    Down,
}

/// A rank could not move because it is already at a bound.
#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq, Hash)]
pub enum BoundaryReached {
    /// The rank is already [`Rank::MAX`].
    #[display("Rank cannot go above {}", Rank::MAX)]
    Ceiling,
    /// The rank is already [`Rank::MIN`].
    #[display("Rank cannot go below {}", Rank::MIN)]
    Floor,
}

/// The result of adjusting a user's rank.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RankAdjustment {
    /// The ID of the user whose rank was adjusted.
    pub user_id: i32,
    /// The rank after the adjustment.
    pub rank: Rank,
    /// The progress bar value for [`RankAdjustment::rank`].
    pub progress: u8,
    /// A message describing why the rank did not change, if it didn't.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// A number was outside of the rank bounds.
#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq)]
#[display("rank {_0} is not between 1 and 25")]
pub struct RankRangeError(#[error(not(source))] pub i64);

/// An error for parsing ranks.
#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq)]
pub enum RankParseError {
    /// The string was not a number.
    #[display("rank is not a number")]
    NotANumber,
    /// The number was outside of the rank bounds.
    #[display("{_0}")]
    OutOfRange(RankRangeError),
}
