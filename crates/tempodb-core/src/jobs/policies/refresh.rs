//! Continuous-aggregate refresh policy.
//!
//! Refreshes an aggregate over the window `[now - start_offset,
//! now - end_offset)` on the materialization's open dimension. The
//! refresh action is idempotent and safe to re-run, and it may commit the
//! ambient transaction mid-flight; the runtime executor tolerates that.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempodb_commons::{HypertableId, JobId, Offset, Result, TempoDbError};

use crate::app_context::AppContext;
use crate::catalog::{ContinuousAggregate, RefreshWindow};
use crate::jobs::policies::{open_dimension_for_hypertable, parse_config, window_boundary};
use crate::txn::TxnSession;

/// Config document shape:
/// `{ mat_hypertable_id, start_offset, end_offset }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub mat_hypertable_id: HypertableId,
    pub start_offset: Offset,
    pub end_offset: Offset,
}

/// Resolved refresh work: the aggregate and the validated window.
#[derive(Debug, Clone)]
pub struct PolicyRefreshData {
    pub cagg: ContinuousAggregate,
    pub window: RefreshWindow,
}

impl RefreshConfig {
    /// Resolve the config against the live catalog.
    ///
    /// The window must be non-empty: since both edges are lags behind
    /// now, `start_offset` has to reach further back than `end_offset`.
    pub fn read_and_validate(&self, ctx: &AppContext) -> Result<PolicyRefreshData> {
        let mat_ht = ctx
            .storage()
            .hypertable(self.mat_hypertable_id)
            .ok_or_else(|| {
                TempoDbError::invalid_parameter(format!(
                    "configuration materialization hypertable id {} not found",
                    self.mat_hypertable_id
                ))
            })?;

        let dim = open_dimension_for_hypertable(ctx, &mat_ht)?;
        let start = window_boundary(ctx, &dim, &self.start_offset)?;
        let end = window_boundary(ctx, &dim, &self.end_offset)?;

        if start >= end {
            return Err(TempoDbError::invalid_parameter(format!(
                "invalid refresh window: start {} is not before end {} (start_offset must lie further in the past than end_offset)",
                start, end
            )));
        }

        let cagg = ctx
            .storage()
            .continuous_aggregate_by_mat_id(mat_ht.id)
            .ok_or_else(|| {
                TempoDbError::invalid_parameter(format!(
                    "no continuous aggregate is backed by materialization hypertable id {}",
                    mat_ht.id
                ))
            })?;

        Ok(PolicyRefreshData {
            cagg,
            window: RefreshWindow { start, end },
        })
    }
}

/// Continuous-aggregate refresh entry point, signature `(job_id, config)`.
pub fn policy_refresh_cagg_execute(
    ctx: &AppContext,
    session: &mut TxnSession,
    job_id: JobId,
    config: Option<&Value>,
) -> Result<()> {
    let config: RefreshConfig = parse_config(config, "continuous aggregate refresh")?;
    let data = config.read_and_validate(ctx)?;

    info!(
        "job {} refreshing continuous aggregate {} over [{}, {})",
        job_id, data.cagg.user_view, data.window.start, data.window.end
    );
    ctx.storage()
        .refresh_continuous_aggregate(session, &data.cagg, data.window)
}
