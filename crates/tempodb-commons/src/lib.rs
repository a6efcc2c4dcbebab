//! # tempodb-commons
//!
//! Shared vocabulary for the TempoDB maintenance scheduler: typed
//! identifiers, the persisted catalog entities (job, job statistics, chunk
//! run records), time primitives, the error taxonomy, and the
//! order-preserving storage key encoding used by the entity stores.

pub mod errors;
pub mod ids;
pub mod models;
pub mod storage_key;
pub mod time;

pub use errors::{Result, TempoDbError};
pub use ids::{ChunkId, DimensionId, HypertableId, JobId};
pub use models::{ChunkStat, ChunkStatKey, Job, JobStat, ProcName, RoleName};
pub use storage_key::{decode_key, encode_key, encode_prefix, StorageKey};
pub use time::{Clock, Interval, Offset, SystemClock, Timestamp};
