//! Typed identifiers for catalog entities.

mod chunk_id;
mod dimension_id;
mod hypertable_id;
mod job_id;

pub use chunk_id::ChunkId;
pub use dimension_id::DimensionId;
pub use hypertable_id::HypertableId;
pub use job_id::JobId;
