//! Job runtime executor.
//!
//! Runs one job's target callable exactly once with correct transaction
//! and snapshot framing, independent of what the callable does inside,
//! including committing the transaction it was called in.
//!
//! The framing rules:
//! - a transaction is opened only when none is open, and committed (or
//!   rolled back on failure) only by the side that opened it;
//! - a read snapshot is installed only when none is active (plain
//!   function targets need a consistent read view), and popped only when
//!   this call installed it *and* it is still active afterwards. A
//!   callable that committed mid-run has already dropped it, and popping
//!   unconditionally would corrupt the session;
//! - failures inside the callable propagate uncaught. Retry and backoff
//!   belong to the external scheduler runtime, never to this component.

use std::sync::Arc;

use log::debug;
use tempodb_commons::{Job, Result, TempoDbError};

use crate::app_context::AppContext;
use crate::jobs::registry::JobCallable;
use crate::txn::TxnSession;

/// Executes job target callables with transaction and snapshot framing.
pub struct JobRuntime {
    ctx: Arc<AppContext>,
}

impl JobRuntime {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Execute one job against the given session.
    ///
    /// This is the single entry point the scheduler runtime calls for a
    /// due job, and the path a manual run takes as well. Job statistics
    /// are updated here: `last_start` before dispatch, and on success
    /// `last_finish` plus the interval-derived `next_start` (unless the
    /// run already pinned one, e.g. through the fast-restart signal).
    ///
    /// # Errors
    /// - `UndefinedObject` when the target callable is not registered
    /// - `FeatureNotSupported` for aggregate or window targets
    /// - `InvalidParameter` when the stored config is not valid JSON
    /// - whatever the callable itself raises, unchanged
    pub fn execute(&self, session: &mut TxnSession, job: &Job) -> Result<()> {
        let owns_txn = if !session.in_transaction() {
            session.begin()?;
            true
        } else {
            false
        };

        // Executing a plain function requires a consistent read view.
        let owns_snapshot = if !session.snapshot_active() {
            session.push_snapshot()?;
            true
        } else {
            false
        };

        let result = self.dispatch(session, job);

        // The callable may have committed or restarted the transaction,
        // which drops the snapshot with it. Pop only what is still there
        // and was installed by this call.
        if owns_snapshot && session.snapshot_active() {
            session.pop_snapshot()?;
        }

        if owns_txn && session.in_transaction() {
            if result.is_ok() {
                session.commit()?;
            } else {
                session.rollback()?;
            }
        }

        result
    }

    fn dispatch(&self, session: &mut TxnSession, job: &Job) -> Result<()> {
        let callable = self.ctx.procedures().resolve(&job.proc)?;

        // Bind the arguments once: the job id and the parsed config
        // document (or nothing). The config text is never cached between
        // runs, so this parse happens on every execution.
        let config = job.parsed_config()?;

        debug!("executing job {} ({})", job.id, job.proc);
        self.ctx
            .job_stats()
            .mark_start(job.id, self.ctx.clock().now())?;

        match callable {
            JobCallable::Function(f) => f(&self.ctx, job.id, config.as_ref())?,
            JobCallable::Procedure(p) => p(&self.ctx, session, job.id, config.as_ref())?,
            JobCallable::Aggregate | JobCallable::Window => {
                return Err(TempoDbError::feature_not_supported(
                    "unsupported function type",
                ))
            }
        }

        self.ctx
            .job_stats()
            .mark_finish(job.id, self.ctx.clock().now(), job.schedule_interval)?;
        debug!("job {} completed", job.id);
        Ok(())
    }
}
