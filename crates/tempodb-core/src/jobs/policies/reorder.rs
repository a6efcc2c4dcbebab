//! Storage reorder policy.
//!
//! Rewrites one chunk per run in the order of a configured index.
//! Eligible chunks lie entirely before the 3rd most recent dimension
//! slice (recency approximated via slice count), are neither compressed
//! nor dropped, and have not been reordered by this job before. "Not
//! reordered recently" means "never reordered", per the chunk run
//! records; a known simplification kept as is.
//!
//! When another eligible chunk remains after the run, the policy requests
//! a fast restart instead of waiting a full schedule interval.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempodb_commons::{ChunkId, HypertableId, JobId, Result, TempoDbError};

use crate::app_context::AppContext;
use crate::catalog::{Hypertable, IndexRef};
use crate::jobs::fast_restart::enable_fast_restart;
use crate::jobs::policies::parse_config;
use crate::txn::TxnSession;

/// Number of most recent dimension slices whose chunks are never touched.
pub const REORDER_SKIP_RECENT_DIM_SLICES_N: usize = 3;

/// Config document shape: `{ hypertable_id, index_name }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderConfig {
    pub hypertable_id: HypertableId,
    pub index_name: String,
}

/// Resolved reorder work: the hypertable and the validated index handle.
#[derive(Debug, Clone)]
pub struct PolicyReorderData {
    pub hypertable: Hypertable,
    pub index: IndexRef,
}

impl ReorderConfig {
    /// Resolve the config against the live catalog.
    pub fn read_and_validate(&self, ctx: &AppContext) -> Result<PolicyReorderData> {
        let hypertable = ctx.storage().hypertable(self.hypertable_id).ok_or_else(|| {
            TempoDbError::invalid_parameter(format!(
                "configuration hypertable id {} not found",
                self.hypertable_id
            ))
        })?;
        let index = check_valid_index(ctx, &hypertable, &self.index_name)?;
        Ok(PolicyReorderData { hypertable, index })
    }
}

/// The index must exist in the hypertable's schema and be defined on the
/// hypertable itself.
fn check_valid_index(ctx: &AppContext, ht: &Hypertable, index_name: &str) -> Result<IndexRef> {
    let index = ctx
        .storage()
        .resolve_index(ht.relation.schema(), index_name)
        .ok_or_else(|| {
            TempoDbError::undefined_object(format!("reorder index \"{}\" not found", index_name))
        })?;

    if index.hypertable_id != Some(ht.id) {
        return Err(TempoDbError::invalid_parameter(format!(
            "invalid reorder index: \"{}\" must be an index on hypertable \"{}\"",
            index_name,
            ht.relation.name()
        )));
    }

    Ok(index)
}

/// Pick the chunk to reorder, if any.
///
/// The 3rd most recent slice caps how new a chunk may be; fewer than
/// three slices means nothing is old enough yet. Chunks the job has
/// already reordered are excluded via the chunk run records.
fn chunk_to_reorder(ctx: &AppContext, job_id: JobId, ht: &Hypertable) -> Result<Option<ChunkId>> {
    let dim = ht.open_dimension().ok_or_else(|| {
        TempoDbError::internal(format!("hypertable \"{}\" has no dimensions", ht.relation))
    })?;

    let nth = match ctx
        .storage()
        .nth_latest_slice(dim.id, REORDER_SKIP_RECENT_DIM_SLICES_N)
    {
        Some(slice) => slice,
        None => return Ok(None),
    };

    let exclude = ctx.chunk_stats().chunks_run_by(job_id)?;
    Ok(ctx
        .storage()
        .oldest_reorderable_chunk(dim.id, nth.range_start, &exclude))
}

/// Reorder policy entry point, signature `(job_id, config)`.
pub fn policy_reorder_execute(
    ctx: &AppContext,
    _session: &mut TxnSession,
    job_id: JobId,
    config: Option<&Value>,
) -> Result<()> {
    let config: ReorderConfig = parse_config(config, "reorder")?;
    let data = config.read_and_validate(ctx)?;

    let chunk_id = match chunk_to_reorder(ctx, job_id, &data.hypertable)? {
        Some(id) => id,
        None => {
            info!(
                "no chunks need reordering for hypertable {}",
                data.hypertable.relation
            );
            return Ok(());
        }
    };

    let chunk = ctx.storage().chunk(chunk_id).ok_or_else(|| {
        TempoDbError::internal(format!("chunk {} not found in the catalog", chunk_id))
    })?;

    debug!("reordering chunk {}", chunk.relation);
    ctx.storage().reorder_chunk(chunk_id, &data.index)?;
    debug!("completed reordering chunk {}", chunk.relation);

    ctx.chunk_stats()
        .record_run(job_id, chunk_id, ctx.clock().now())?;

    if chunk_to_reorder(ctx, job_id, &data.hypertable)?.is_some() {
        enable_fast_restart(ctx, job_id, "reorder")?;
    }

    Ok(())
}
