//! Job administration API.
//!
//! Add, alter, delete and run for the job catalog. All validation happens
//! before any row is written: a bad config document, a missing privilege
//! or a bad interval aborts the operation with nothing committed, and an
//! alter writes its whole field set atomically under the job's row lock
//! or not at all.
//!
//! Periodic dispatch is not here; the external scheduler runtime polls
//! due times and calls [`execute`](JobsManager::execute) per due job.

use std::sync::Arc;

use log::info;
use serde_json::Value;
use tempodb_commons::{Interval, Job, JobId, ProcName, Result, RoleName, TempoDbError, Timestamp};

use crate::app_context::AppContext;
use crate::jobs::executor::JobRuntime;
use crate::jobs::policies::job_config_check;
use crate::txn::TxnSession;

/// Parameters for [`JobsManager::add_job`].
#[derive(Debug, Clone)]
pub struct AddJob {
    pub proc: ProcName,
    pub schedule_interval: Interval,
    pub config: Option<Value>,
    pub initial_start: Option<Timestamp>,
    pub scheduled: bool,
    pub job_name: Option<String>,
}

impl AddJob {
    pub fn new(proc: ProcName, schedule_interval: Interval) -> Self {
        Self {
            proc,
            schedule_interval,
            config: None,
            initial_start: None,
            scheduled: true,
            job_name: None,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_initial_start(mut self, initial_start: Timestamp) -> Self {
        self.initial_start = Some(initial_start);
        self
    }

    pub fn with_scheduled(mut self, scheduled: bool) -> Self {
        self.scheduled = scheduled;
        self
    }

    pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = Some(job_name.into());
        self
    }
}

/// Field set modifiable through [`JobsManager::alter_job`]. Unset fields
/// stay unchanged.
#[derive(Debug, Clone, Default)]
pub struct AlterJob {
    pub schedule_interval: Option<Interval>,
    pub max_runtime: Option<Interval>,
    pub max_retries: Option<i32>,
    pub retry_period: Option<Interval>,
    pub scheduled: Option<bool>,
    pub config: Option<Value>,
    pub next_start: Option<Timestamp>,
    /// Return `None` instead of failing when the job does not exist.
    pub if_exists: bool,
}

/// The full row an alter returns, with the effective `next_start`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlteredJob {
    pub job: Job,
    pub next_start: Timestamp,
}

/// Administration surface over the job catalog.
pub struct JobsManager {
    ctx: Arc<AppContext>,
    runtime: JobRuntime,
}

impl JobsManager {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let runtime = JobRuntime::new(ctx.clone());
        Self { ctx, runtime }
    }

    /// Register a new job.
    ///
    /// Checks, in order: the schedule interval is positive for a
    /// scheduled job, the target callable is registered, the caller may
    /// execute it and may own background jobs, and (for a built-in
    /// policy target) the config document validates against the live
    /// catalog. Only then is the row inserted. An `initial_start` seeds
    /// the job's `next_start` so the first run does not wait a full
    /// interval.
    ///
    /// # Errors
    /// - `InvalidParameter` for a non-positive interval or a bad config
    /// - `UndefinedObject` when the callable is not registered
    /// - `InsufficientPrivilege` when the caller fails either check
    pub fn add_job(&self, caller: &RoleName, spec: AddJob) -> Result<JobId> {
        if spec.scheduled && !spec.schedule_interval.is_positive() {
            return Err(TempoDbError::invalid_parameter(
                "schedule interval must be positive for a scheduled job",
            ));
        }

        self.ctx.procedures().resolve(&spec.proc)?;

        if !self.ctx.access().has_execute_privilege(caller, &spec.proc) {
            return Err(TempoDbError::insufficient_privilege(format!(
                "permission denied for function \"{}\": the job owner must be able to execute it",
                spec.proc
            )));
        }
        if !self.ctx.access().can_own_background_jobs(caller) {
            return Err(TempoDbError::insufficient_privilege(format!(
                "user \"{}\" cannot own background jobs",
                caller
            )));
        }

        if let Some(config) = &spec.config {
            job_config_check(&self.ctx, &spec.proc, config)?;
        }

        let job_id = self.ctx.jobs().allocate_id();
        let mut job = Job::new(job_id, spec.proc, caller.clone(), spec.schedule_interval)
            .with_scheduled(spec.scheduled);
        if let Some(job_name) = spec.job_name {
            job = job.with_job_name(job_name);
        }
        if let Some(config) = &spec.config {
            job = job.with_config(config);
        }
        self.ctx.jobs().insert_job(&job)?;

        if let Some(initial_start) = spec.initial_start {
            self.ctx.job_stats().upsert_next_start(job_id, initial_start)?;
        }

        info!("created job {} ({})", job_id, job.proc);
        Ok(job_id)
    }

    /// Remove a job and its statistics.
    ///
    /// # Errors
    /// - `UndefinedObject` when the job does not exist
    /// - `InsufficientPrivilege` unless the caller has the privileges of
    ///   the job's owner
    pub fn delete_job(&self, caller: &RoleName, job_id: JobId) -> Result<()> {
        let job = self.find_job(job_id)?;

        if !self.ctx.access().has_privs_of_role(caller, &job.owner) {
            return Err(TempoDbError::insufficient_privilege(format!(
                "insufficient permissions to delete job owned by \"{}\"",
                job.owner
            )));
        }

        self.ctx.jobs().delete_job(&job_id)?;
        self.ctx.job_stats().delete(&job_id)?;
        self.ctx.chunk_stats().delete_for_job(job_id)?;

        info!("deleted job {}", job_id);
        Ok(())
    }

    /// Update a job's modifiable fields and return the full updated row.
    ///
    /// A changed schedule interval recomputes `next_start` as
    /// `last_finish + interval` when a stats row exists, unless that sum
    /// is the unset sentinel (the job never finished), in which case
    /// `next_start` is left alone. An explicit `next_start` in the field
    /// set overrides the recomputation. A config document present after the
    /// update is re-validated before anything is written; on failure no
    /// field changes.
    ///
    /// With `if_exists`, a missing job yields `Ok(None)` and a notice log
    /// instead of an error.
    pub fn alter_job(
        &self,
        caller: &RoleName,
        job_id: JobId,
        spec: AlterJob,
    ) -> Result<Option<AlteredJob>> {
        let job = match self.ctx.jobs().get_job(&job_id)? {
            Some(job) => job,
            None if spec.if_exists => {
                info!("job {} not found, skipping", job_id);
                return Ok(None);
            }
            None => {
                return Err(TempoDbError::undefined_object(format!(
                    "job {} not found",
                    job_id
                )))
            }
        };

        if !self.ctx.access().has_privs_of_role(caller, &job.owner) {
            return Err(TempoDbError::insufficient_privilege(format!(
                "insufficient permissions to alter job owned by \"{}\"",
                job.owner
            )));
        }

        let mut updated = job.clone();
        if let Some(schedule_interval) = spec.schedule_interval {
            updated.schedule_interval = schedule_interval;
        }
        if let Some(max_runtime) = spec.max_runtime {
            updated.max_runtime = max_runtime;
        }
        if let Some(max_retries) = spec.max_retries {
            if max_retries < -1 {
                return Err(TempoDbError::invalid_parameter(
                    "max_retries must be -1 (unlimited) or a non-negative count",
                ));
            }
            updated.max_retries = max_retries;
        }
        if let Some(retry_period) = spec.retry_period {
            updated.retry_period = retry_period;
        }
        if let Some(scheduled) = spec.scheduled {
            updated.scheduled = scheduled;
        }
        if let Some(config) = &spec.config {
            updated.config = Some(config.to_string());
        }

        if updated.scheduled && !updated.schedule_interval.is_positive() {
            return Err(TempoDbError::invalid_parameter(
                "schedule interval must be positive for a scheduled job",
            ));
        }

        // Validate the resulting config before any write, so a failure
        // leaves the row untouched.
        if let Some(value) = updated.parsed_config()? {
            job_config_check(&self.ctx, &updated.proc, &value)?;
        }

        let interval_changed = updated.schedule_interval != job.schedule_interval;

        let row = updated.clone();
        self.ctx
            .jobs()
            .update_job_with(&job_id, move |stored| *stored = row)?;

        if interval_changed {
            if let Some(stat) = self.ctx.job_stats().get(&job_id)? {
                let next_start = stat.last_finish.plus(updated.schedule_interval);
                if !next_start.is_unset() {
                    self.ctx.job_stats().set_next_start(job_id, next_start)?;
                }
            }
        }

        if let Some(next_start) = spec.next_start {
            self.ctx.job_stats().upsert_next_start(job_id, next_start)?;
        }

        let next_start = self
            .ctx
            .job_stats()
            .get(&job_id)?
            .map(|stat| stat.next_start)
            .unwrap_or(Timestamp::UNSET);

        Ok(Some(AlteredJob {
            job: updated,
            next_start,
        }))
    }

    /// Run a job synchronously, outside its schedule.
    ///
    /// Same execution contract as periodic dispatch, distinct entry
    /// point.
    pub fn run_job(&self, session: &mut TxnSession, job_id: JobId) -> Result<()> {
        let job = self.find_job(job_id)?;
        self.runtime.execute(session, &job)
    }

    /// Execute one job. The entry point the scheduler runtime calls for
    /// a due job; retry and backoff stay on its side.
    pub fn execute(&self, session: &mut TxnSession, job: &Job) -> Result<()> {
        self.runtime.execute(session, job)
    }

    /// Look up a job by id.
    pub fn get_job(&self, job_id: JobId) -> Result<Option<Job>> {
        self.ctx.jobs().get_job(&job_id)
    }

    /// All registered jobs in id order.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        self.ctx.jobs().list_jobs()
    }

    fn find_job(&self, job_id: JobId) -> Result<Job> {
        self.ctx
            .jobs()
            .get_job(&job_id)?
            .ok_or_else(|| TempoDbError::undefined_object(format!("job {} not found", job_id)))
    }
}
