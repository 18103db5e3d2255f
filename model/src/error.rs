//! API error structs.

use derive_more::{Display, Error};

use serde::{Deserialize, Serialize};

/// An API error.
///
/// Every failed request answers with one of these as its body.
#[derive(Clone, Debug, Display, Deserialize, Error, Serialize, PartialEq, Eq)]
#[display("{message}")]
pub struct ApiError {
    /// A message suitable to show the user.
    pub message: String,
}

impl ApiError {
    /// Creates a new `ApiError`.
    pub fn new(message: impl Into<String>) -> ApiError {
        ApiError {
            message: message.into(),
        }
    }
}
