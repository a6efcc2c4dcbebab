//! System job statistics provider.
//!
//! Execution history is kept apart from the job rows: stats are created
//! lazily on the first scheduling event, survive alters, and are the
//! channel through which the fast-restart signal reaches the scheduler
//! runtime.
//!
//! Writers for one job id serialize through the store's row lock
//! (get-or-create and read-modify-write both run under it), so a
//! concurrent alter and run on the same job cannot interleave mid-update.

use std::sync::Arc;

use tempodb_commons::{Interval, JobId, JobStat, Result, Timestamp};
use tempodb_store::{EntityStore, StorageBackend};

const JOB_STATS_PARTITION: &str = "system_job_stats";

/// Per-job execution history provider.
pub struct JobStatsProvider {
    store: EntityStore<JobId, JobStat>,
}

impl JobStatsProvider {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            store: EntityStore::new(backend, JOB_STATS_PARTITION),
        }
    }

    /// Look up the stats row for a job.
    pub fn get(&self, job_id: &JobId) -> Result<Option<JobStat>> {
        Ok(self.store.get(job_id)?)
    }

    /// Record the start of a run.
    ///
    /// Clears `next_start` to the unset sentinel so that a value written
    /// during the run (fast restart, or an explicit alter) is
    /// distinguishable from stale scheduling data when the run finishes.
    pub fn mark_start(&self, job_id: JobId, now: Timestamp) -> Result<JobStat> {
        Ok(self.store.upsert(
            &job_id,
            || JobStat::new(job_id),
            |stat| {
                stat.last_start = now;
                stat.next_start = Timestamp::UNSET;
            },
        )?)
    }

    /// Record the successful end of a run.
    ///
    /// `next_start` is computed from the finish time and the schedule
    /// interval only when nothing set it during the run; an explicit
    /// fast-restart value wins.
    pub fn mark_finish(
        &self,
        job_id: JobId,
        now: Timestamp,
        schedule_interval: Interval,
    ) -> Result<JobStat> {
        Ok(self.store.upsert(
            &job_id,
            || JobStat::new(job_id),
            |stat| {
                stat.last_finish = now;
                if stat.next_start.is_unset() {
                    stat.next_start = now.plus(schedule_interval);
                }
            },
        )?)
    }

    /// Set `next_start` on an existing stats row.
    ///
    /// Returns `false` when the job has no stats row yet; callers that
    /// want get-or-create semantics use
    /// [`upsert_next_start`](Self::upsert_next_start).
    pub fn set_next_start(&self, job_id: JobId, next_start: Timestamp) -> Result<bool> {
        Ok(self
            .store
            .mutate(&job_id, |stat| stat.next_start = next_start)?
            .is_some())
    }

    /// Set `next_start`, creating the stats row if needed.
    pub fn upsert_next_start(&self, job_id: JobId, next_start: Timestamp) -> Result<()> {
        self.store.upsert(
            &job_id,
            || JobStat::new(job_id),
            |stat| stat.next_start = next_start,
        )?;
        Ok(())
    }

    /// Remove the stats row. Idempotent.
    pub fn delete(&self, job_id: &JobId) -> Result<()> {
        self.store.delete(job_id)?;
        Ok(())
    }
}
