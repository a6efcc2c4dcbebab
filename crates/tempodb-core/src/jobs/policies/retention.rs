//! Data retention policy.
//!
//! Drops every chunk of the target hypertable lying entirely before
//! `now - drop_after`. A single pass is exhaustive, so this policy never
//! requests a fast restart.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempodb_commons::{HypertableId, JobId, Offset, Result, TempoDbError};

use crate::app_context::AppContext;
use crate::catalog::RelationName;
use crate::jobs::policies::{open_dimension_for_hypertable, parse_config, window_boundary};
use crate::txn::TxnSession;

/// Config document shape: `{ hypertable_id, drop_after }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub hypertable_id: HypertableId,
    pub drop_after: Offset,
}

/// Resolved retention work: what to drop against, and up to where.
#[derive(Debug, Clone)]
pub struct PolicyRetentionData {
    pub target: RelationName,
    pub boundary: i64,
}

impl RetentionConfig {
    /// Resolve the config against the live catalog.
    ///
    /// When the configured hypertable turns out to be a continuous
    /// aggregate's materialization table, the drop is redirected to the
    /// aggregate's user-facing view, found by reverse lookup on the
    /// materialization id. Dropping against the internal table directly
    /// would bypass the aggregate's bookkeeping.
    pub fn read_and_validate(&self, ctx: &AppContext) -> Result<PolicyRetentionData> {
        let hypertable = ctx.storage().hypertable(self.hypertable_id).ok_or_else(|| {
            TempoDbError::invalid_parameter(format!(
                "configuration hypertable id {} not found",
                self.hypertable_id
            ))
        })?;

        let dim = open_dimension_for_hypertable(ctx, &hypertable)?;
        let boundary = window_boundary(ctx, &dim, &self.drop_after)?;

        let target = match ctx.storage().continuous_aggregate_by_mat_id(hypertable.id) {
            Some(cagg) => cagg.user_view,
            None => hypertable.relation,
        };

        Ok(PolicyRetentionData { target, boundary })
    }
}

/// Retention policy entry point, signature `(job_id, config)`.
pub fn policy_retention_execute(
    ctx: &AppContext,
    _session: &mut TxnSession,
    job_id: JobId,
    config: Option<&Value>,
) -> Result<()> {
    let config: RetentionConfig = parse_config(config, "retention")?;
    let data = config.read_and_validate(ctx)?;

    let dropped = ctx.storage().drop_chunks(&data.target, data.boundary)?;
    info!(
        "job {} dropped {} chunks from {}",
        job_id,
        dropped.len(),
        data.target
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PartitionKind;
    use crate::test_utils::test_context;
    use serde_json::json;
    use tempodb_commons::Interval;

    #[test]
    fn test_unknown_hypertable_is_invalid_parameter() {
        let env = test_context();
        let config = RetentionConfig {
            hypertable_id: HypertableId::new(404),
            drop_after: Offset::Interval(Interval::from_days(30)),
        };
        let err = config.read_and_validate(&env.ctx).unwrap_err();
        assert!(matches!(err, TempoDbError::InvalidParameter(_)));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_boundary_is_now_minus_drop_after() {
        let env = test_context();
        let ht_id = env.storage.add_hypertable("public", "conditions", PartitionKind::Timestamp);

        let config = RetentionConfig {
            hypertable_id: ht_id,
            drop_after: Offset::Interval(Interval::from_days(1)),
        };
        let data = config.read_and_validate(&env.ctx).unwrap();
        assert_eq!(
            data.boundary,
            env.clock.timestamp().as_millis() - Interval::from_days(1).as_millis()
        );
        assert_eq!(data.target.to_string(), "public.conditions");
    }

    #[test]
    fn test_materialization_table_redirects_to_user_view() {
        let env = test_context();
        let raw = env.storage.add_hypertable("public", "conditions", PartitionKind::Timestamp);
        let mat = env.storage.add_hypertable(
            "_tempodb_internal",
            "_materialized_hypertable_2",
            PartitionKind::Timestamp,
        );
        env.storage.add_continuous_aggregate(raw, mat, "public", "my_view");

        let config = RetentionConfig {
            hypertable_id: mat,
            drop_after: Offset::Interval(Interval::from_days(7)),
        };
        let data = config.read_and_validate(&env.ctx).unwrap();
        assert_eq!(data.target.to_string(), "public.my_view");
    }

    #[test]
    fn test_execute_drops_chunks_before_boundary() {
        let env = test_context();
        let ht_id = env.storage.add_hypertable("public", "conditions", PartitionKind::Timestamp);
        let now = env.clock.timestamp().as_millis();
        let old = env.storage.add_chunk(ht_id, now - 200_000, now - 100_000);
        let fresh = env.storage.add_chunk(ht_id, now - 1_000, now + 1_000);

        let mut session = TxnSession::new();
        policy_retention_execute(
            &env.ctx,
            &mut session,
            JobId::new(1),
            Some(&json!({"hypertable_id": ht_id.as_i32(), "drop_after": "50s"})),
        )
        .unwrap();

        assert!(env.ctx.storage().chunk(old).unwrap().dropped);
        assert!(!env.ctx.storage().chunk(fresh).unwrap().dropped);
    }
}
