//! Type-safe wrapper for job identifiers.

use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::storage_key::{decode_key, encode_key, StorageKey};

/// Type-safe wrapper for job identifiers.
///
/// Job ids are allocated by the jobs provider and are the primary key of
/// the job catalog, its statistics rows, and the per-chunk run records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct JobId(i32);

impl JobId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for JobId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl StorageKey for JobId {
    fn storage_key(&self) -> Vec<u8> {
        encode_key(&self.0)
    }

    fn from_storage_key(bytes: &[u8]) -> Result<Self, String> {
        decode_key::<i32>(bytes).map(JobId)
    }
}
