//! Type-safe wrapper for dimension identifiers.

use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Type-safe wrapper for dimension identifiers.
///
/// Dimension-slice queries (nth-latest slice, reorder and compression
/// candidates) are keyed by the open dimension's id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct DimensionId(i32);

impl DimensionId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for DimensionId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}
