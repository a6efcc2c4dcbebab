//! Type-safe wrapper for hypertable identifiers.

use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Type-safe wrapper for hypertable identifiers.
///
/// A hypertable id appears in policy config documents and is re-resolved
/// to a live catalog handle on every use; the id itself is the only thing
/// this subsystem persists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct HypertableId(i32);

impl HypertableId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for HypertableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for HypertableId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}
