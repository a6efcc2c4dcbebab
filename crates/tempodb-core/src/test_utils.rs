//! Test fixtures.
//!
//! An in-memory stand-in for the catalog/storage layer, a manual clock,
//! and ready-made application contexts. Public (not test-gated) so the
//! integration suites under `tests/` can use the same fixtures as the
//! unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use tempodb_commons::time::Clock;
use tempodb_commons::{
    ChunkId, DimensionId, HypertableId, Interval, ProcName, Result, RoleName, TempoDbError,
    Timestamp,
};
use tempodb_store::MemoryBackend;

use crate::access::{AccessControl, AllowAll};
use crate::app_context::AppContext;
use crate::catalog::{
    Chunk, ContinuousAggregate, Dimension, DimensionSlice, Hypertable, HypertableStore, IndexRef,
    PartitionKind, RefreshWindow, RelationName,
};
use crate::jobs::policies::register_builtin_policies;
use crate::txn::TxnSession;

#[derive(Default)]
struct CatalogState {
    hypertables: HashMap<HypertableId, Hypertable>,
    chunks: BTreeMap<ChunkId, Chunk>,
    chunk_slices: HashMap<ChunkId, Vec<DimensionSlice>>,
    caggs: HashMap<HypertableId, ContinuousAggregate>,
    indexes: Vec<(String, IndexRef)>,
    integer_now: HashMap<DimensionId, i64>,
    next_hypertable_id: i32,
    next_dimension_id: i32,
    next_chunk_id: i32,
    commit_on_refresh: bool,

    dropped: Vec<(RelationName, i64)>,
    compressed: Vec<ChunkId>,
    reordered: Vec<(ChunkId, String)>,
    refreshed: Vec<(HypertableId, RefreshWindow)>,
}

/// In-memory catalog/storage layer.
///
/// Builder methods assemble hypertables, chunks, aggregates and indexes;
/// the action methods record what was asked of them (and flip the chunk
/// flags) so tests can assert against the log.
#[derive(Default)]
pub struct MemoryHypertableStore {
    state: RwLock<CatalogState>,
}

impl MemoryHypertableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hypertable with a single open dimension of the given kind.
    pub fn add_hypertable(
        &self,
        schema: &str,
        name: &str,
        kind: PartitionKind,
    ) -> HypertableId {
        let mut state = self.state.write().expect("catalog state poisoned");
        state.next_hypertable_id += 1;
        state.next_dimension_id += 1;
        let id = HypertableId::new(state.next_hypertable_id);
        let dimension = Dimension {
            id: DimensionId::new(state.next_dimension_id),
            hypertable_id: id,
            kind,
            has_integer_now: false,
        };
        state.hypertables.insert(
            id,
            Hypertable {
                id,
                relation: RelationName::new(schema, name),
                dimensions: vec![dimension],
            },
        );
        id
    }

    /// Configure an integer-now resolver on the hypertable's open
    /// dimension.
    pub fn set_integer_now(&self, hypertable_id: HypertableId, value: i64) {
        let mut state = self.state.write().expect("catalog state poisoned");
        let dim_id = {
            let ht = state
                .hypertables
                .get_mut(&hypertable_id)
                .expect("unknown hypertable");
            let dim = ht.dimensions.first_mut().expect("hypertable has no dimensions");
            dim.has_integer_now = true;
            dim.id
        };
        state.integer_now.insert(dim_id, value);
    }

    /// Add a chunk covering `[range_start, range_end)` on the
    /// hypertable's open dimension.
    pub fn add_chunk(&self, hypertable_id: HypertableId, range_start: i64, range_end: i64) -> ChunkId {
        let mut state = self.state.write().expect("catalog state poisoned");
        let dimension_id = state
            .hypertables
            .get(&hypertable_id)
            .and_then(|ht| ht.open_dimension())
            .expect("hypertable has no dimensions")
            .id;
        state.next_chunk_id += 1;
        let id = ChunkId::new(state.next_chunk_id);
        state.chunks.insert(
            id,
            Chunk {
                id,
                hypertable_id,
                relation: RelationName::new(
                    "_tempodb_internal",
                    format!("_hyper_{}_{}_chunk", hypertable_id, id),
                ),
                compressed: false,
                dropped: false,
            },
        );
        state.chunk_slices.insert(
            id,
            vec![DimensionSlice {
                dimension_id,
                range_start,
                range_end,
            }],
        );
        id
    }

    /// Register a continuous aggregate backed by `mat` over `raw`.
    pub fn add_continuous_aggregate(
        &self,
        raw: HypertableId,
        mat: HypertableId,
        view_schema: &str,
        view_name: &str,
    ) {
        let mut state = self.state.write().expect("catalog state poisoned");
        state.caggs.insert(
            mat,
            ContinuousAggregate {
                mat_hypertable_id: mat,
                raw_hypertable_id: raw,
                user_view: RelationName::new(view_schema, view_name),
            },
        );
    }

    /// Add an index on the given hypertable, resolvable in its schema.
    pub fn add_index(&self, hypertable_id: HypertableId, index_name: &str) {
        let mut state = self.state.write().expect("catalog state poisoned");
        let schema = state
            .hypertables
            .get(&hypertable_id)
            .expect("unknown hypertable")
            .relation
            .schema()
            .to_string();
        state.indexes.push((
            schema,
            IndexRef {
                name: index_name.to_string(),
                hypertable_id: Some(hypertable_id),
            },
        ));
    }

    /// Make the refresh action commit and restart the ambient
    /// transaction, the way a real aggregate refresh does.
    pub fn set_commit_on_refresh(&self, commit: bool) {
        self.state
            .write()
            .expect("catalog state poisoned")
            .commit_on_refresh = commit;
    }

    /// Drop requests received, as `(target, boundary)`.
    pub fn dropped(&self) -> Vec<(RelationName, i64)> {
        self.state.read().expect("catalog state poisoned").dropped.clone()
    }

    /// Chunks compressed, in order.
    pub fn compressed(&self) -> Vec<ChunkId> {
        self.state.read().expect("catalog state poisoned").compressed.clone()
    }

    /// Reorder runs, as `(chunk, index name)`.
    pub fn reordered(&self) -> Vec<(ChunkId, String)> {
        self.state.read().expect("catalog state poisoned").reordered.clone()
    }

    /// Refresh runs, as `(materialization hypertable, window)`.
    pub fn refreshed(&self) -> Vec<(HypertableId, RefreshWindow)> {
        self.state.read().expect("catalog state poisoned").refreshed.clone()
    }
}

/// Chunks of one dimension with their slices, ordered by
/// `(range_start, chunk id)` for deterministic selection.
fn candidates(state: &CatalogState, dimension_id: DimensionId) -> Vec<(ChunkId, DimensionSlice)> {
    let mut out: Vec<(ChunkId, DimensionSlice)> = state
        .chunk_slices
        .iter()
        .flat_map(|(chunk_id, slices)| {
            slices
                .iter()
                .filter(|slice| slice.dimension_id == dimension_id)
                .map(|slice| (*chunk_id, *slice))
        })
        .collect();
    out.sort_by_key(|(chunk_id, slice)| (slice.range_start, *chunk_id));
    out
}

impl HypertableStore for MemoryHypertableStore {
    fn hypertable(&self, id: HypertableId) -> Option<Hypertable> {
        self.state
            .read()
            .expect("catalog state poisoned")
            .hypertables
            .get(&id)
            .cloned()
    }

    fn chunk(&self, id: ChunkId) -> Option<Chunk> {
        self.state
            .read()
            .expect("catalog state poisoned")
            .chunks
            .get(&id)
            .cloned()
    }

    fn continuous_aggregate_by_mat_id(&self, mat_id: HypertableId) -> Option<ContinuousAggregate> {
        self.state
            .read()
            .expect("catalog state poisoned")
            .caggs
            .get(&mat_id)
            .cloned()
    }

    fn integer_now_dimension_by_mat_id(&self, mat_id: HypertableId) -> Option<Dimension> {
        let state = self.state.read().expect("catalog state poisoned");
        let cagg = state.caggs.get(&mat_id)?;
        let raw = state.hypertables.get(&cagg.raw_hypertable_id)?;
        raw.open_dimension()
            .filter(|dim| dim.has_integer_now)
            .cloned()
    }

    fn integer_now(&self, dim: &Dimension) -> Result<i64> {
        self.state
            .read()
            .expect("catalog state poisoned")
            .integer_now
            .get(&dim.id)
            .copied()
            .ok_or_else(|| {
                TempoDbError::internal(format!(
                    "missing integer now function for dimension {}",
                    dim.id
                ))
            })
    }

    fn nth_latest_slice(&self, dimension_id: DimensionId, n: usize) -> Option<DimensionSlice> {
        let state = self.state.read().expect("catalog state poisoned");
        let mut slices: Vec<DimensionSlice> = candidates(&state, dimension_id)
            .into_iter()
            .map(|(_, slice)| slice)
            .collect();
        slices.dedup_by_key(|slice| (slice.range_start, slice.range_end));
        slices.reverse();
        if n == 0 {
            return None;
        }
        slices.get(n - 1).copied()
    }

    fn oldest_reorderable_chunk(
        &self,
        dimension_id: DimensionId,
        end_at_or_before: i64,
        exclude: &[ChunkId],
    ) -> Option<ChunkId> {
        let state = self.state.read().expect("catalog state poisoned");
        candidates(&state, dimension_id)
            .into_iter()
            .filter(|(_, slice)| slice.range_end <= end_at_or_before)
            .filter(|(chunk_id, _)| !exclude.contains(chunk_id))
            .find(|(chunk_id, _)| {
                state
                    .chunks
                    .get(chunk_id)
                    .map(|chunk| !chunk.compressed && !chunk.dropped)
                    .unwrap_or(false)
            })
            .map(|(chunk_id, _)| chunk_id)
    }

    fn chunk_for_compression(&self, dimension_id: DimensionId, boundary: i64) -> Option<ChunkId> {
        let state = self.state.read().expect("catalog state poisoned");
        candidates(&state, dimension_id)
            .into_iter()
            .filter(|(_, slice)| slice.range_end <= boundary)
            .find(|(chunk_id, _)| {
                state
                    .chunks
                    .get(chunk_id)
                    .map(|chunk| !chunk.compressed && !chunk.dropped)
                    .unwrap_or(false)
            })
            .map(|(chunk_id, _)| chunk_id)
    }

    fn resolve_index(&self, schema: &str, index_name: &str) -> Option<IndexRef> {
        self.state
            .read()
            .expect("catalog state poisoned")
            .indexes
            .iter()
            .find(|(index_schema, index)| index_schema == schema && index.name == index_name)
            .map(|(_, index)| index.clone())
    }

    fn drop_chunks(&self, target: &RelationName, boundary: i64) -> Result<Vec<ChunkId>> {
        let mut state = self.state.write().expect("catalog state poisoned");

        let hypertable_id = state
            .hypertables
            .values()
            .find(|ht| ht.relation == *target)
            .map(|ht| ht.id)
            .or_else(|| {
                state
                    .caggs
                    .values()
                    .find(|cagg| cagg.user_view == *target)
                    .map(|cagg| cagg.mat_hypertable_id)
            })
            .ok_or_else(|| {
                TempoDbError::invalid_parameter(format!(
                    "relation \"{}\" is not a hypertable or continuous aggregate",
                    target
                ))
            })?;

        let dimension_id = state
            .hypertables
            .get(&hypertable_id)
            .and_then(|ht| ht.open_dimension())
            .map(|dim| dim.id)
            .ok_or_else(|| {
                TempoDbError::internal(format!("hypertable {} has no dimensions", hypertable_id))
            })?;

        let doomed: Vec<ChunkId> = candidates(&state, dimension_id)
            .into_iter()
            .filter(|(_, slice)| slice.range_end <= boundary)
            .map(|(chunk_id, _)| chunk_id)
            .filter(|chunk_id| {
                state
                    .chunks
                    .get(chunk_id)
                    .map(|chunk| chunk.hypertable_id == hypertable_id && !chunk.dropped)
                    .unwrap_or(false)
            })
            .collect();

        for chunk_id in &doomed {
            if let Some(chunk) = state.chunks.get_mut(chunk_id) {
                chunk.dropped = true;
            }
        }
        state.dropped.push((target.clone(), boundary));
        Ok(doomed)
    }

    fn compress_chunk(&self, chunk_id: ChunkId) -> Result<()> {
        let mut state = self.state.write().expect("catalog state poisoned");
        let chunk = state
            .chunks
            .get_mut(&chunk_id)
            .ok_or_else(|| TempoDbError::internal(format!("chunk {} not found", chunk_id)))?;
        chunk.compressed = true;
        state.compressed.push(chunk_id);
        Ok(())
    }

    fn reorder_chunk(&self, chunk_id: ChunkId, index: &IndexRef) -> Result<()> {
        let mut state = self.state.write().expect("catalog state poisoned");
        if !state.chunks.contains_key(&chunk_id) {
            return Err(TempoDbError::internal(format!("chunk {} not found", chunk_id)));
        }
        state.reordered.push((chunk_id, index.name.clone()));
        Ok(())
    }

    fn refresh_continuous_aggregate(
        &self,
        session: &mut TxnSession,
        cagg: &ContinuousAggregate,
        window: RefreshWindow,
    ) -> Result<()> {
        let commit = self
            .state
            .read()
            .expect("catalog state poisoned")
            .commit_on_refresh;
        if commit && session.in_transaction() {
            session.commit_and_restart()?;
        }
        self.state
            .write()
            .expect("catalog state poisoned")
            .refreshed
            .push((cagg.mat_hypertable_id, window));
        Ok(())
    }
}

/// Settable clock for tests.
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.as_millis()),
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }

    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.as_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Interval) {
        self.millis.fetch_add(by.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.timestamp()
    }
}

/// Access control with switchable answers; role-vs-owner checks compare
/// names directly.
pub struct StaticAccess {
    pub allow_execute: bool,
    pub allow_background_jobs: bool,
}

impl Default for StaticAccess {
    fn default() -> Self {
        Self {
            allow_execute: true,
            allow_background_jobs: true,
        }
    }
}

impl AccessControl for StaticAccess {
    fn has_execute_privilege(&self, _role: &RoleName, _proc: &ProcName) -> bool {
        self.allow_execute
    }

    fn can_own_background_jobs(&self, _role: &RoleName) -> bool {
        self.allow_background_jobs
    }

    fn has_privs_of_role(&self, role: &RoleName, owner: &RoleName) -> bool {
        role == owner
    }
}

/// A ready-made context over in-memory fixtures.
pub struct TestEnv {
    pub ctx: Arc<AppContext>,
    pub storage: Arc<MemoryHypertableStore>,
    pub clock: Arc<ManualClock>,
}

/// Context with allow-all access control and the built-in policies
/// registered. The clock starts at a fixed epoch.
pub fn test_context() -> TestEnv {
    test_context_with_access(Arc::new(AllowAll))
}

/// Like [`test_context`] with a custom access control implementation.
pub fn test_context_with_access(access: Arc<dyn AccessControl>) -> TestEnv {
    let storage = Arc::new(MemoryHypertableStore::new());
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_700_000_000_000)));
    let ctx = Arc::new(AppContext::new(
        storage.clone(),
        Arc::new(MemoryBackend::new()),
        access,
        clock.clone(),
    ));
    register_builtin_policies(ctx.procedures());
    TestEnv {
        ctx,
        storage,
        clock,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nth_latest_slice() {
        let store = MemoryHypertableStore::new();
        let ht = store.add_hypertable("public", "conditions", PartitionKind::Timestamp);
        for i in 0..4 {
            store.add_chunk(ht, i * 100, (i + 1) * 100);
        }
        let dim = store.hypertable(ht).unwrap().open_dimension().unwrap().id;

        let latest = store.nth_latest_slice(dim, 1).unwrap();
        assert_eq!(latest.range_start, 300);

        let third = store.nth_latest_slice(dim, 3).unwrap();
        assert_eq!(third.range_start, 100);

        assert!(store.nth_latest_slice(dim, 5).is_none());
    }

    #[test]
    fn test_selection_skips_compressed_and_excluded() {
        let store = MemoryHypertableStore::new();
        let ht = store.add_hypertable("public", "conditions", PartitionKind::Timestamp);
        let first = store.add_chunk(ht, 0, 100);
        let second = store.add_chunk(ht, 100, 200);
        let dim = store.hypertable(ht).unwrap().open_dimension().unwrap().id;

        assert_eq!(store.chunk_for_compression(dim, 200), Some(first));
        store.compress_chunk(first).unwrap();
        assert_eq!(store.chunk_for_compression(dim, 200), Some(second));

        assert_eq!(store.oldest_reorderable_chunk(dim, 200, &[second]), None);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(Timestamp::from_millis(1_000));
        clock.advance(Interval::from_secs(2));
        assert_eq!(clock.now(), Timestamp::from_millis(3_000));
        clock.set(Timestamp::from_millis(10));
        assert_eq!(clock.now(), Timestamp::from_millis(10));
    }
}
