//! User representations.

use serde::{Deserialize, Serialize};

use crate::rank::Rank;

/// The current user returned by `/users/~me`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct CurrentUser {
    /// The unique ID of the user.
    pub id: i32,
    /// The name of the user.
    pub name: String,
    /// The email the user signs in with.
    pub email: String,
    /// The user's rank, if they have one.
    pub rank: Option<Rank>,
}

/// A single user.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct User {
    /// The unique ID of the user.
    pub id: i32,
    /// The name of the user.
    pub name: String,
    /// The user's rank.
    ///
    /// If this is `None`, the user has never set a rank.
    pub rank: Option<Rank>,
}

impl User {
    /// The rank the user is displayed with.
    ///
    /// Unranked users are displayed as [`Rank::DEFAULT`].
    pub fn display_rank(&self) -> Rank {
        self.rank.unwrap_or_default()
    }

    /// The progress bar value of the user.
    pub fn progress(&self) -> u8 {
        self.display_rank().progress()
    }
}
