//! System jobs provider.
//!
//! Persists the job catalog through an `EntityStore<JobId, Job>` and owns
//! job id allocation. Rows iterate in id order thanks to the
//! order-preserving key encoding.
//!
//! Mutation goes through [`update_job_with`](JobsProvider::update_job_with),
//! which holds the row-exclusive lock for the whole read-modify-write, so
//! two concurrent alters of the same job serialize instead of racing.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tempodb_commons::{Job, JobId, Result, TempoDbError};
use tempodb_store::{EntityStore, StorageBackend};

const JOBS_PARTITION: &str = "system_jobs";

/// Job catalog provider.
pub struct JobsProvider {
    store: EntityStore<JobId, Job>,
    next_id: AtomicI32,
}

impl JobsProvider {
    /// Create a provider on the given backend.
    ///
    /// The id sequence resumes after the highest persisted job id.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let store: EntityStore<JobId, Job> = EntityStore::new(backend, JOBS_PARTITION);
        let next_id = match store.scan_all(None) {
            Ok(rows) => rows.last().map(|(id, _)| id.as_i32() + 1).unwrap_or(1),
            Err(e) => {
                log::warn!("could not scan job catalog for id seeding: {}", e);
                1
            }
        };
        Self {
            store,
            next_id: AtomicI32::new(next_id),
        }
    }

    /// Allocate the next job id.
    pub fn allocate_id(&self) -> JobId {
        JobId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Insert a new job row.
    pub fn insert_job(&self, job: &Job) -> Result<()> {
        self.store.put(&job.id, job)?;
        Ok(())
    }

    /// Look up a job by id.
    pub fn get_job(&self, job_id: &JobId) -> Result<Option<Job>> {
        Ok(self.store.get(job_id)?)
    }

    /// Overwrite fields of an existing job under its row lock.
    ///
    /// The closure sees the current row and edits it in place; the whole
    /// read-modify-write happens while the row-exclusive lock is held.
    pub fn update_job_with<F>(&self, job_id: &JobId, f: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        self.store
            .mutate(job_id, f)?
            .ok_or_else(|| TempoDbError::undefined_object(format!("job {} not found", job_id)))
    }

    /// Remove a job row. Idempotent.
    pub fn delete_job(&self, job_id: &JobId) -> Result<()> {
        self.store.delete(job_id)?;
        Ok(())
    }

    /// All jobs in id order.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        Ok(self
            .store
            .scan_all(None)?
            .into_iter()
            .map(|(_, job)| job)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempodb_commons::{Interval, ProcName, RoleName};
    use tempodb_store::MemoryBackend;

    fn provider() -> JobsProvider {
        JobsProvider::new(Arc::new(MemoryBackend::new()))
    }

    fn job(provider: &JobsProvider) -> Job {
        Job::new(
            provider.allocate_id(),
            ProcName::new("analytics", "rollup_hourly"),
            RoleName::new("alice"),
            Interval::from_hours(1),
        )
    }

    #[test]
    fn test_insert_and_get() {
        let provider = provider();
        let job = job(&provider);
        provider.insert_job(&job).unwrap();
        assert_eq!(provider.get_job(&job.id).unwrap(), Some(job));
    }

    #[test]
    fn test_id_allocation_is_monotonic() {
        let provider = provider();
        let a = provider.allocate_id();
        let b = provider.allocate_id();
        assert!(b.as_i32() > a.as_i32());
    }

    #[test]
    fn test_id_sequence_resumes_after_restart() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let provider = JobsProvider::new(backend.clone());
        let job = Job::new(
            JobId::new(41),
            ProcName::new("analytics", "rollup_hourly"),
            RoleName::new("alice"),
            Interval::from_hours(1),
        );
        provider.insert_job(&job).unwrap();

        let reopened = JobsProvider::new(backend);
        assert_eq!(reopened.allocate_id(), JobId::new(42));
    }

    #[test]
    fn test_update_job_with_missing_row() {
        let provider = provider();
        let err = provider
            .update_job_with(&JobId::new(99), |j| j.scheduled = false)
            .unwrap_err();
        assert!(matches!(err, TempoDbError::UndefinedObject(_)));
    }

    #[test]
    fn test_update_job_with_edits_row() {
        let provider = provider();
        let job = job(&provider);
        provider.insert_job(&job).unwrap();

        let updated = provider
            .update_job_with(&job.id, |j| j.scheduled = false)
            .unwrap();
        assert!(!updated.scheduled);
        assert!(!provider.get_job(&job.id).unwrap().unwrap().scheduled);
    }

    #[test]
    fn test_list_jobs_in_id_order() {
        let provider = provider();
        let first = job(&provider);
        let second = job(&provider);
        provider.insert_job(&second).unwrap();
        provider.insert_job(&first).unwrap();

        let ids: Vec<JobId> = provider.list_jobs().unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_delete_job() {
        let provider = provider();
        let job = job(&provider);
        provider.insert_job(&job).unwrap();
        provider.delete_job(&job.id).unwrap();
        assert_eq!(provider.get_job(&job.id).unwrap(), None);
    }
}
