//! Built-in maintenance policies.
//!
//! Four policies ship with the scheduler: data retention, storage
//! reordering, compression, and continuous-aggregate refresh. Each one is
//! an ordinary procedure registered under the internal schema; a job
//! whose target matches one of these names carries a config document that
//! parses into the closed [`PolicyConfig`] set.
//!
//! Every policy has a read+validate step shared between config authoring
//! time (the administration API rejects a bad document before any row is
//! written) and execution time (the document is re-parsed and the target
//! re-resolved on every run).

pub mod compression;
pub mod refresh;
pub mod retention;
pub mod reorder;

pub use compression::{policy_compression_execute, CompressionConfig};
pub use refresh::{policy_refresh_cagg_execute, RefreshConfig};
pub use reorder::{policy_reorder_execute, ReorderConfig, REORDER_SKIP_RECENT_DIM_SLICES_N};
pub use retention::{policy_retention_execute, RetentionConfig};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tempodb_commons::{Job, Offset, ProcName, Result, TempoDbError};

use crate::app_context::AppContext;
use crate::catalog::{Dimension, Hypertable, PartitionKind};
use crate::jobs::registry::{JobCallable, ProcedureRegistry};

/// Schema the built-in policies live under.
pub const INTERNAL_SCHEMA: &str = "_tempodb_internal";

pub const RETENTION_PROC_NAME: &str = "policy_retention";
pub const REORDER_PROC_NAME: &str = "policy_reorder";
pub const COMPRESSION_PROC_NAME: &str = "policy_compression";
pub const REFRESH_CAGG_PROC_NAME: &str = "policy_refresh_continuous_aggregate";

/// The closed set of policy config shapes, keyed on the callable name.
///
/// One exhaustive parse step turns a job's `(proc, config)` pair into a
/// typed variant; everything outside the internal schema is `Custom` and
/// carries whatever document the user attached, unvalidated.
#[derive(Debug, Clone)]
pub enum PolicyConfig {
    Retention(RetentionConfig),
    Reorder(ReorderConfig),
    Compression(CompressionConfig),
    ContinuousAggRefresh(RefreshConfig),
    Custom,
}

impl PolicyConfig {
    /// Parse a config document against the callable it is attached to.
    ///
    /// # Errors
    /// `InvalidParameter` when the callable is a built-in policy and the
    /// document is missing or malformed.
    pub fn parse(proc: &ProcName, config: Option<&Value>) -> Result<Self> {
        if proc.schema() != INTERNAL_SCHEMA {
            return Ok(PolicyConfig::Custom);
        }
        match proc.name() {
            RETENTION_PROC_NAME => Ok(PolicyConfig::Retention(parse_config(config, "retention")?)),
            REORDER_PROC_NAME => Ok(PolicyConfig::Reorder(parse_config(config, "reorder")?)),
            COMPRESSION_PROC_NAME => Ok(PolicyConfig::Compression(parse_config(
                config,
                "compression",
            )?)),
            REFRESH_CAGG_PROC_NAME => Ok(PolicyConfig::ContinuousAggRefresh(parse_config(
                config,
                "continuous aggregate refresh",
            )?)),
            _ => Ok(PolicyConfig::Custom),
        }
    }
}

/// Deserialize a required policy config document.
pub(crate) fn parse_config<T: DeserializeOwned>(config: Option<&Value>, policy: &str) -> Result<T> {
    let value = config.ok_or_else(|| {
        TempoDbError::invalid_parameter(format!("config must not be NULL for a {} policy", policy))
    })?;
    serde_json::from_value(value.clone()).map_err(|e| {
        TempoDbError::invalid_parameter(format!("invalid {} policy config: {}", policy, e))
    })
}

/// Validate a config document the way the policy's executor will.
///
/// Called by the administration API on add and alter so that a bad
/// document aborts before any catalog row is touched. Running it twice on
/// the same document resolves the same target and has no side effects.
pub fn job_config_check(ctx: &AppContext, proc: &ProcName, config: &Value) -> Result<()> {
    match PolicyConfig::parse(proc, Some(config))? {
        PolicyConfig::Retention(c) => {
            c.read_and_validate(ctx)?;
        }
        PolicyConfig::Reorder(c) => {
            c.read_and_validate(ctx)?;
        }
        PolicyConfig::Compression(c) => {
            c.read_and_validate(ctx)?;
        }
        PolicyConfig::ContinuousAggRefresh(c) => {
            c.read_and_validate(ctx)?;
        }
        PolicyConfig::Custom => {}
    }
    Ok(())
}

/// Install the four built-in policies into a registry.
pub fn register_builtin_policies(registry: &ProcedureRegistry) {
    registry.register(
        ProcName::new(INTERNAL_SCHEMA, RETENTION_PROC_NAME),
        JobCallable::Procedure(Arc::new(policy_retention_execute)),
    );
    registry.register(
        ProcName::new(INTERNAL_SCHEMA, REORDER_PROC_NAME),
        JobCallable::Procedure(Arc::new(policy_reorder_execute)),
    );
    registry.register(
        ProcName::new(INTERNAL_SCHEMA, COMPRESSION_PROC_NAME),
        JobCallable::Procedure(Arc::new(policy_compression_execute)),
    );
    registry.register(
        ProcName::new(INTERNAL_SCHEMA, REFRESH_CAGG_PROC_NAME),
        JobCallable::Procedure(Arc::new(policy_refresh_cagg_execute)),
    );
}

/// The dimension a policy computes its window against.
///
/// Normally the hypertable's open dimension. An integer-partitioned
/// materialization hypertable does not carry its own integer-now
/// resolver; the dimension holding it is found through the continuous
/// aggregate the hypertable backs, and a materialization hypertable
/// without one is unrecoverable for the policy.
pub(crate) fn open_dimension_for_hypertable(
    ctx: &AppContext,
    ht: &Hypertable,
) -> Result<Dimension> {
    let open = ht.open_dimension().cloned().ok_or_else(|| {
        TempoDbError::internal(format!("hypertable \"{}\" has no dimensions", ht.relation))
    })?;
    match open.kind {
        PartitionKind::Timestamp => Ok(open),
        PartitionKind::Integer if open.has_integer_now => Ok(open),
        PartitionKind::Integer => ctx
            .storage()
            .integer_now_dimension_by_mat_id(ht.id)
            .ok_or_else(|| {
                TempoDbError::internal(format!(
                    "missing integer now function for hypertable \"{}\"",
                    ht.relation
                ))
            }),
    }
}

/// Compute `now - lag` in the dimension's internal units.
///
/// The lag shape must match the partitioning: intervals against the wall
/// clock for time partitioning, integers against the integer-now resolver
/// for integer partitioning.
pub(crate) fn window_boundary(ctx: &AppContext, dim: &Dimension, lag: &Offset) -> Result<i64> {
    match (dim.kind, lag) {
        (PartitionKind::Timestamp, Offset::Interval(interval)) => Ok(ctx
            .clock()
            .now()
            .as_millis()
            .saturating_sub(interval.as_millis())),
        (PartitionKind::Integer, Offset::Integer(n)) => {
            let now = ctx.storage().integer_now(dim)?;
            now.checked_sub(*n).ok_or_else(|| {
                TempoDbError::invalid_parameter("lag overflows the dimension's value range")
            })
        }
        (PartitionKind::Timestamp, Offset::Integer(_)) => Err(TempoDbError::invalid_parameter(
            "time-partitioned dimension requires an interval lag",
        )),
        (PartitionKind::Integer, Offset::Interval(_)) => Err(TempoDbError::invalid_parameter(
            "integer-partitioned dimension requires an integer lag",
        )),
    }
}

/// Background job counts per built-in policy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobTypeCounts {
    pub retention: usize,
    pub reorder: usize,
    pub compression: usize,
    pub continuous_agg_refresh: usize,
    pub user_defined_action: usize,
}

/// Classify jobs by their target callable.
pub fn job_type_counts(jobs: &[Job]) -> JobTypeCounts {
    let mut counts = JobTypeCounts::default();
    for job in jobs {
        if job.proc.schema() == INTERNAL_SCHEMA {
            match job.proc.name() {
                RETENTION_PROC_NAME => counts.retention += 1,
                REORDER_PROC_NAME => counts.reorder += 1,
                COMPRESSION_PROC_NAME => counts.compression += 1,
                REFRESH_CAGG_PROC_NAME => counts.continuous_agg_refresh += 1,
                _ => counts.user_defined_action += 1,
            }
        } else {
            counts.user_defined_action += 1;
        }
    }
    counts
}
