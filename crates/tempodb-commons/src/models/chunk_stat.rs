//! Per-job, per-chunk run records.
//!
//! Backs the reorder policy's eligibility check: a chunk that appears here
//! has been processed by the job before and is skipped. "Processed
//! recently" currently means "processed ever", a known simplification.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::ids::{ChunkId, JobId};
use crate::storage_key::{decode_key, encode_key, encode_prefix, StorageKey};
use crate::time::Timestamp;

/// Composite key `(job_id, chunk_id)` for chunk run records.
///
/// Encoded as a tuple so that all records of one job share a byte prefix
/// and can be collected with a single prefix scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkStatKey {
    pub job_id: JobId,
    pub chunk_id: ChunkId,
}

impl ChunkStatKey {
    pub fn new(job_id: JobId, chunk_id: ChunkId) -> Self {
        Self { job_id, chunk_id }
    }

    /// Byte prefix shared by every record of the given job.
    pub fn job_prefix(job_id: JobId) -> Vec<u8> {
        encode_prefix(&(job_id.as_i32(),))
    }
}

impl StorageKey for ChunkStatKey {
    fn storage_key(&self) -> Vec<u8> {
        encode_key(&(self.job_id.as_i32(), self.chunk_id.as_i32()))
    }

    fn from_storage_key(bytes: &[u8]) -> Result<Self, String> {
        let (job, chunk): (i32, i32) = decode_key(bytes)?;
        Ok(Self::new(JobId::new(job), ChunkId::new(chunk)))
    }
}

/// Run counters for one `(job, chunk)` pair.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct ChunkStat {
    pub num_times_run: i64,
    pub last_run: Timestamp,
}

impl ChunkStat {
    pub fn never_run() -> Self {
        Self {
            num_times_run: 0,
            last_run: Timestamp::UNSET,
        }
    }
}
