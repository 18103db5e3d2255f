//! User endpoint request bodies.

use serde::{Deserialize, Serialize};

use crate::rank::RankDirection;

/// Request to move the rank of a user.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AdjustRankRequest {
    /// Which way to move the rank.
    pub direction: RankDirection,
}
