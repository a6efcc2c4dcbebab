//! Chunk-side catalog entities.

use tempodb_commons::{ChunkId, DimensionId, HypertableId};

use super::hypertable::RelationName;

/// The range a chunk covers on one dimension. Ranges are half-open:
/// `[range_start, range_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSlice {
    pub dimension_id: DimensionId,
    pub range_start: i64,
    pub range_end: i64,
}

/// A physical partition of a hypertable.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub hypertable_id: HypertableId,
    pub relation: RelationName,
    pub compressed: bool,
    pub dropped: bool,
}
