//! Compression policy.
//!
//! Compresses one chunk per run: the oldest uncompressed chunk lying
//! entirely before `now - compress_after`. Finding none is a success (an
//! informational notice, not an error). When a second candidate remains
//! after the run, the policy requests a fast restart so the backlog
//! drains across several scheduler turns instead of one unbounded
//! transaction.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempodb_commons::{ChunkId, HypertableId, JobId, Offset, Result, TempoDbError};

use crate::app_context::AppContext;
use crate::catalog::{Dimension, Hypertable};
use crate::jobs::fast_restart::enable_fast_restart;
use crate::jobs::policies::{parse_config, window_boundary};
use crate::txn::TxnSession;

/// Config document shape: `{ hypertable_id, compress_after }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub hypertable_id: HypertableId,
    pub compress_after: Offset,
}

/// Resolved compression target.
#[derive(Debug, Clone)]
pub struct PolicyCompressionData {
    pub hypertable: Hypertable,
}

impl CompressionConfig {
    /// Resolve the config against the live catalog.
    pub fn read_and_validate(&self, ctx: &AppContext) -> Result<PolicyCompressionData> {
        let hypertable = ctx.storage().hypertable(self.hypertable_id).ok_or_else(|| {
            TempoDbError::invalid_parameter(format!(
                "configuration hypertable id {} not found",
                self.hypertable_id
            ))
        })?;
        Ok(PolicyCompressionData { hypertable })
    }
}

fn chunk_to_compress(ctx: &AppContext, dim: &Dimension, lag: &Offset) -> Result<Option<ChunkId>> {
    let boundary = window_boundary(ctx, dim, lag)?;
    Ok(ctx.storage().chunk_for_compression(dim.id, boundary))
}

/// Compression policy entry point, signature `(job_id, config)`.
pub fn policy_compression_execute(
    ctx: &AppContext,
    _session: &mut TxnSession,
    job_id: JobId,
    config: Option<&Value>,
) -> Result<()> {
    let config: CompressionConfig = parse_config(config, "compression")?;
    let data = config.read_and_validate(ctx)?;

    let dim = data.hypertable.open_dimension().cloned().ok_or_else(|| {
        TempoDbError::internal(format!(
            "hypertable \"{}\" has no dimensions",
            data.hypertable.relation
        ))
    })?;

    match chunk_to_compress(ctx, &dim, &config.compress_after)? {
        None => {
            info!(
                "no chunks for hypertable {} satisfy the compression policy",
                data.hypertable.relation
            );
        }
        Some(chunk_id) => {
            let chunk = ctx.storage().chunk(chunk_id).ok_or_else(|| {
                TempoDbError::internal(format!("chunk {} not found in the catalog", chunk_id))
            })?;
            ctx.storage().compress_chunk(chunk_id)?;
            info!("completed compressing chunk {}", chunk.relation);
        }
    }

    // The boundary selection is deterministic, so finding a candidate here
    // means the run above left work behind.
    if chunk_to_compress(ctx, &dim, &config.compress_after)?.is_some() {
        enable_fast_restart(ctx, job_id, "compression")?;
    }

    debug!("job {} completed compressing chunk", job_id);
    Ok(())
}
