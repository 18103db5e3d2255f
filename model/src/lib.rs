//! API model representations.

pub mod error;
pub mod rank;
pub mod request;
pub mod user;

pub use error::ApiError;
pub use rank::{BoundaryReached, Rank, RankAdjustment, RankDirection};
pub use user::User;
