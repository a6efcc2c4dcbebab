//! Catalog and storage layer seam.
//!
//! The scheduler never touches table data itself; every lookup and every
//! maintenance action goes through [`HypertableStore`]. The trait is the
//! stable signature of the external catalog/storage collaborator, and the
//! in-memory implementation in [`test_utils`](crate::test_utils) stands in
//! for it in tests.

mod chunk;
mod hypertable;

pub use chunk::{Chunk, DimensionSlice};
pub use hypertable::{
    ContinuousAggregate, Dimension, Hypertable, IndexRef, PartitionKind, RelationName,
};

use tempodb_commons::{ChunkId, DimensionId, HypertableId, Result};

use crate::txn::TxnSession;

/// A refresh window `[start, end)` in the dimension's internal units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshWindow {
    pub start: i64,
    pub end: i64,
}

/// Lookup and maintenance surface of the catalog/storage layer.
///
/// Slice-based selection queries treat ranges as half-open, so a chunk
/// lies entirely before a bound exactly when its `range_end` is at or
/// before it. Selection must be deterministic for identical catalog
/// state: candidates order by `(range_start, chunk id)`.
pub trait HypertableStore: Send + Sync {
    /// Resolve a hypertable id to a live handle.
    fn hypertable(&self, id: HypertableId) -> Option<Hypertable>;

    /// Resolve a chunk id to a live handle.
    fn chunk(&self, id: ChunkId) -> Option<Chunk>;

    /// Reverse lookup: the continuous aggregate backed by the given
    /// materialization hypertable, if any.
    fn continuous_aggregate_by_mat_id(&self, mat_id: HypertableId) -> Option<ContinuousAggregate>;

    /// The dimension carrying an integer-now resolver for the given
    /// materialization hypertable (found on the aggregate's source
    /// hypertable), if any.
    fn integer_now_dimension_by_mat_id(&self, mat_id: HypertableId) -> Option<Dimension>;

    /// Evaluate the dimension's integer-now resolver.
    ///
    /// Fails `Internal` when the dimension has no resolver configured.
    fn integer_now(&self, dim: &Dimension) -> Result<i64>;

    /// The nth most recent distinct slice of a dimension (1-based), or
    /// `None` when fewer than `n` slices exist.
    fn nth_latest_slice(&self, dimension_id: DimensionId, n: usize) -> Option<DimensionSlice>;

    /// The oldest chunk whose slice on this dimension ends at or before
    /// `end_at_or_before`, skipping compressed chunks, dropped chunks and
    /// the ids in `exclude`.
    fn oldest_reorderable_chunk(
        &self,
        dimension_id: DimensionId,
        end_at_or_before: i64,
        exclude: &[ChunkId],
    ) -> Option<ChunkId>;

    /// The oldest uncompressed, undropped chunk whose slice on this
    /// dimension ends at or before `boundary`.
    fn chunk_for_compression(&self, dimension_id: DimensionId, boundary: i64) -> Option<ChunkId>;

    /// Resolve an index by name within a schema.
    fn resolve_index(&self, schema: &str, index_name: &str) -> Option<IndexRef>;

    /// Drop all chunks of `target` lying entirely before `boundary`.
    /// Returns the dropped chunk ids.
    fn drop_chunks(&self, target: &RelationName, boundary: i64) -> Result<Vec<ChunkId>>;

    /// Compress one chunk.
    fn compress_chunk(&self, chunk_id: ChunkId) -> Result<()>;

    /// Rewrite one chunk in the order of the given index.
    fn reorder_chunk(&self, chunk_id: ChunkId, index: &IndexRef) -> Result<()>;

    /// Refresh a continuous aggregate over the window. Idempotent and safe
    /// to re-run. May commit and restart the ambient transaction through
    /// the session, which callers must tolerate.
    fn refresh_continuous_aggregate(
        &self,
        session: &mut TxnSession,
        cagg: &ContinuousAggregate,
        window: RefreshWindow,
    ) -> Result<()>;
}
