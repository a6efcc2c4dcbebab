//! End-to-end policy runs through the administration API and the runtime
//! executor, against the in-memory catalog.

use serde_json::json;
use tempodb_commons::{Interval, RoleName, TempoDbError};
use tempodb_core::catalog::PartitionKind;
use tempodb_core::jobs::policies::{
    COMPRESSION_PROC_NAME, INTERNAL_SCHEMA, REFRESH_CAGG_PROC_NAME, REORDER_PROC_NAME,
    RETENTION_PROC_NAME,
};
use tempodb_core::test_utils::test_context;
use tempodb_core::{AddJob, JobsManager, TxnSession};
use tempodb_commons::ProcName;

fn alice() -> RoleName {
    RoleName::new("alice")
}

fn policy(name: &str) -> ProcName {
    ProcName::new(INTERNAL_SCHEMA, name)
}

#[test]
fn test_retention_on_materialization_drops_against_the_view() {
    let env = test_context();
    let raw = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    let mat = env.storage.add_hypertable(
        "_tempodb_internal",
        "_materialized_hypertable_2",
        PartitionKind::Timestamp,
    );
    env.storage
        .add_continuous_aggregate(raw, mat, "public", "my_view");
    let now = env.clock.timestamp().as_millis();
    env.storage.add_chunk(mat, now - 200_000, now - 100_000);

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(RETENTION_PROC_NAME), Interval::from_hours(1)).with_config(
                json!({"hypertable_id": mat.as_i32(), "drop_after": "50s"}),
            ),
        )
        .unwrap();

    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    let dropped = env.storage.dropped();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].0.to_string(), "public.my_view");
}

#[test]
fn test_retention_on_plain_hypertable_drops_against_it() {
    let env = test_context();
    let ht = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    let now = env.clock.timestamp().as_millis();
    let old = env.storage.add_chunk(ht, now - 200_000, now - 100_000);

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(RETENTION_PROC_NAME), Interval::from_hours(1)).with_config(
                json!({"hypertable_id": ht.as_i32(), "drop_after": "50s"}),
            ),
        )
        .unwrap();

    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    assert_eq!(env.storage.dropped()[0].0.to_string(), "public.conditions");
    assert!(env.ctx.storage().chunk(old).unwrap().dropped);
}

#[test]
fn test_reorder_skips_the_three_most_recent_chunks() {
    let env = test_context();
    let ht = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    env.storage.add_index(ht, "conditions_time_idx");
    for i in 0..3 {
        env.storage.add_chunk(ht, i * 100, (i + 1) * 100);
    }

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(REORDER_PROC_NAME), Interval::from_hours(1)).with_config(json!({
                "hypertable_id": ht.as_i32(),
                "index_name": "conditions_time_idx"
            })),
        )
        .unwrap();

    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    // Nothing is old enough with only three chunks; success as a no-op
    assert!(env.storage.reordered().is_empty());
}

#[test]
fn test_reorder_processes_oldest_once_and_fast_restarts_while_work_remains() {
    let env = test_context();
    let ht = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    env.storage.add_index(ht, "conditions_time_idx");
    let mut chunks = Vec::new();
    for i in 0..5 {
        chunks.push(env.storage.add_chunk(ht, i * 100, (i + 1) * 100));
    }

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(REORDER_PROC_NAME), Interval::from_hours(1)).with_config(json!({
                "hypertable_id": ht.as_i32(),
                "index_name": "conditions_time_idx"
            })),
        )
        .unwrap();

    // First run: the oldest chunk is reordered and, with another eligible
    // chunk remaining, the job asks to run again immediately
    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    assert_eq!(env.storage.reordered().len(), 1);
    assert_eq!(env.storage.reordered()[0].0, chunks[0]);
    let stat = env.ctx.job_stats().get(&job_id).unwrap().unwrap();
    assert_eq!(stat.next_start, stat.last_start);

    // Second run: the next oldest goes, nothing eligible remains, and the
    // schedule returns to normal
    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    assert_eq!(env.storage.reordered().len(), 2);
    assert_eq!(env.storage.reordered()[1].0, chunks[1]);
    let stat = env.ctx.job_stats().get(&job_id).unwrap().unwrap();
    assert_eq!(
        stat.next_start,
        stat.last_finish.plus(Interval::from_hours(1))
    );

    // Third run: already-reordered chunks stay done
    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();
    assert_eq!(env.storage.reordered().len(), 2);
}

#[test]
fn test_compression_fast_restart_fires_only_while_work_remains() {
    let env = test_context();
    let ht = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    let now = env.clock.timestamp().as_millis();
    let first = env.storage.add_chunk(ht, now - 400_000, now - 300_000);
    let second = env.storage.add_chunk(ht, now - 300_000, now - 200_000);

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(COMPRESSION_PROC_NAME), Interval::from_hours(1)).with_config(
                json!({"hypertable_id": ht.as_i32(), "compress_after": "100s"}),
            ),
        )
        .unwrap();

    // First run compresses one chunk; the second one still qualifies, so
    // next_start is forced back to this run's own start
    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    assert_eq!(env.storage.compressed(), vec![first]);
    let stat = env.ctx.job_stats().get(&job_id).unwrap().unwrap();
    assert_eq!(stat.next_start, stat.last_start);

    // Second run drains the backlog; no restart this time
    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    assert_eq!(env.storage.compressed(), vec![first, second]);
    let stat = env.ctx.job_stats().get(&job_id).unwrap().unwrap();
    assert_ne!(stat.next_start, stat.last_start);
    assert_eq!(
        stat.next_start,
        stat.last_finish.plus(Interval::from_hours(1))
    );
}

#[test]
fn test_compression_with_nothing_eligible_is_success() {
    let env = test_context();
    let ht = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    let now = env.clock.timestamp().as_millis();
    env.storage.add_chunk(ht, now - 1_000, now + 1_000);

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(COMPRESSION_PROC_NAME), Interval::from_hours(1)).with_config(
                json!({"hypertable_id": ht.as_i32(), "compress_after": "1h"}),
            ),
        )
        .unwrap();

    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    assert!(env.storage.compressed().is_empty());
    let stat = env.ctx.job_stats().get(&job_id).unwrap().unwrap();
    assert_eq!(
        stat.next_start,
        stat.last_finish.plus(Interval::from_hours(1))
    );
}

#[test]
fn test_refresh_runs_over_the_configured_window() {
    let env = test_context();
    let raw = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    let mat = env.storage.add_hypertable(
        "_tempodb_internal",
        "_materialized_hypertable_2",
        PartitionKind::Timestamp,
    );
    env.storage
        .add_continuous_aggregate(raw, mat, "public", "conditions_hourly");

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(REFRESH_CAGG_PROC_NAME), Interval::from_hours(1)).with_config(
                json!({
                    "mat_hypertable_id": mat.as_i32(),
                    "start_offset": "4h",
                    "end_offset": "1h"
                }),
            ),
        )
        .unwrap();

    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    let refreshed = env.storage.refreshed();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].0, mat);
    let now = env.clock.timestamp().as_millis();
    assert_eq!(refreshed[0].1.start, now - Interval::from_hours(4).as_millis());
    assert_eq!(refreshed[0].1.end, now - Interval::from_hours(1).as_millis());
}

#[test]
fn test_refresh_that_commits_mid_run_completes_cleanly() {
    let env = test_context();
    let raw = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    let mat = env.storage.add_hypertable(
        "_tempodb_internal",
        "_materialized_hypertable_2",
        PartitionKind::Timestamp,
    );
    env.storage
        .add_continuous_aggregate(raw, mat, "public", "conditions_hourly");
    env.storage.set_commit_on_refresh(true);

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(REFRESH_CAGG_PROC_NAME), Interval::from_hours(1)).with_config(
                json!({
                    "mat_hypertable_id": mat.as_i32(),
                    "start_offset": "4h",
                    "end_offset": "1h"
                }),
            ),
        )
        .unwrap();

    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    // One commit by the refresh itself, one by the executor closing the
    // restarted transaction it opened; the dropped snapshot was not
    // popped a second time
    assert_eq!(session.commit_count(), 2);
    assert!(!session.in_transaction());
    assert_eq!(env.storage.refreshed().len(), 1);
}

#[test]
fn test_refresh_with_inverted_window_fails_at_add_time() {
    let env = test_context();
    let raw = env
        .storage
        .add_hypertable("public", "conditions", PartitionKind::Timestamp);
    let mat = env.storage.add_hypertable(
        "_tempodb_internal",
        "_materialized_hypertable_2",
        PartitionKind::Timestamp,
    );
    env.storage
        .add_continuous_aggregate(raw, mat, "public", "conditions_hourly");

    let manager = JobsManager::new(env.ctx.clone());
    let err = manager
        .add_job(
            &alice(),
            AddJob::new(policy(REFRESH_CAGG_PROC_NAME), Interval::from_hours(1)).with_config(
                json!({
                    "mat_hypertable_id": mat.as_i32(),
                    "start_offset": "1h",
                    "end_offset": "4h"
                }),
            ),
        )
        .unwrap_err();
    assert!(matches!(err, TempoDbError::InvalidParameter(_)));
}

#[test]
fn test_integer_partitioned_retention_uses_the_resolver() {
    let env = test_context();
    let ht = env
        .storage
        .add_hypertable("metrics", "events", PartitionKind::Integer);
    env.storage.set_integer_now(ht, 1_000);
    let old = env.storage.add_chunk(ht, 0, 400);
    let fresh = env.storage.add_chunk(ht, 400, 800);

    let manager = JobsManager::new(env.ctx.clone());
    let job_id = manager
        .add_job(
            &alice(),
            AddJob::new(policy(RETENTION_PROC_NAME), Interval::from_hours(1)).with_config(
                json!({"hypertable_id": ht.as_i32(), "drop_after": 500}),
            ),
        )
        .unwrap();

    let mut session = TxnSession::new();
    manager.run_job(&mut session, job_id).unwrap();

    // boundary = 1000 - 500 = 500; only [0, 400) lies before it
    assert!(env.ctx.storage().chunk(old).unwrap().dropped);
    assert!(!env.ctx.storage().chunk(fresh).unwrap().dropped);
}
