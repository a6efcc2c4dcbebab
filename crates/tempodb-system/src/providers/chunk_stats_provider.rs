//! System chunk statistics provider.
//!
//! Records which chunks a job has already processed. The reorder policy
//! consults this to skip chunks it has reordered before; "before" means
//! ever, which is the documented simplification.

use std::sync::Arc;

use tempodb_commons::{ChunkId, ChunkStat, ChunkStatKey, JobId, Result, Timestamp};
use tempodb_store::{EntityStore, StorageBackend};

const CHUNK_STATS_PARTITION: &str = "system_chunk_stats";

/// Per-job, per-chunk run record provider.
pub struct ChunkStatsProvider {
    store: EntityStore<ChunkStatKey, ChunkStat>,
}

impl ChunkStatsProvider {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            store: EntityStore::new(backend, CHUNK_STATS_PARTITION),
        }
    }

    /// Record that a job processed a chunk.
    pub fn record_run(&self, job_id: JobId, chunk_id: ChunkId, at: Timestamp) -> Result<()> {
        let key = ChunkStatKey::new(job_id, chunk_id);
        self.store.upsert(&key, ChunkStat::never_run, |stat| {
            stat.num_times_run += 1;
            stat.last_run = at;
        })?;
        Ok(())
    }

    /// Whether a job has ever processed the given chunk.
    pub fn has_run(&self, job_id: JobId, chunk_id: ChunkId) -> Result<bool> {
        Ok(self
            .store
            .get(&ChunkStatKey::new(job_id, chunk_id))?
            .is_some())
    }

    /// All chunks the job has ever processed, in chunk id order.
    pub fn chunks_run_by(&self, job_id: JobId) -> Result<Vec<ChunkId>> {
        Ok(self
            .store
            .scan_prefix(&ChunkStatKey::job_prefix(job_id), None)?
            .into_iter()
            .map(|(key, _)| key.chunk_id)
            .collect())
    }

    /// Drop every record of the given job in one atomic batch.
    pub fn delete_for_job(&self, job_id: JobId) -> Result<()> {
        let keys: Vec<ChunkStatKey> = self
            .store
            .scan_prefix(&ChunkStatKey::job_prefix(job_id), None)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        self.store.delete_many(&keys)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempodb_store::MemoryBackend;

    fn provider() -> ChunkStatsProvider {
        ChunkStatsProvider::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn test_record_and_query() {
        let provider = provider();
        let job = JobId::new(1);
        provider.record_run(job, ChunkId::new(10), Timestamp::from_millis(5)).unwrap();
        provider.record_run(job, ChunkId::new(4), Timestamp::from_millis(6)).unwrap();

        assert!(provider.has_run(job, ChunkId::new(10)).unwrap());
        assert!(!provider.has_run(job, ChunkId::new(11)).unwrap());
        assert_eq!(
            provider.chunks_run_by(job).unwrap(),
            vec![ChunkId::new(4), ChunkId::new(10)]
        );
    }

    #[test]
    fn test_records_are_scoped_per_job() {
        let provider = provider();
        provider.record_run(JobId::new(1), ChunkId::new(10), Timestamp::from_millis(5)).unwrap();
        provider.record_run(JobId::new(2), ChunkId::new(20), Timestamp::from_millis(5)).unwrap();

        assert_eq!(
            provider.chunks_run_by(JobId::new(1)).unwrap(),
            vec![ChunkId::new(10)]
        );
        assert!(!provider.has_run(JobId::new(1), ChunkId::new(20)).unwrap());
    }

    #[test]
    fn test_repeat_runs_increment_counter() {
        let provider = provider();
        let job = JobId::new(1);
        provider.record_run(job, ChunkId::new(10), Timestamp::from_millis(5)).unwrap();
        provider.record_run(job, ChunkId::new(10), Timestamp::from_millis(9)).unwrap();

        // Still a single record for the pair
        assert_eq!(provider.chunks_run_by(job).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_for_job() {
        let provider = provider();
        let job = JobId::new(1);
        provider.record_run(job, ChunkId::new(10), Timestamp::from_millis(5)).unwrap();
        provider.record_run(job, ChunkId::new(11), Timestamp::from_millis(5)).unwrap();
        provider.record_run(JobId::new(2), ChunkId::new(12), Timestamp::from_millis(5)).unwrap();

        provider.delete_for_job(job).unwrap();
        assert!(provider.chunks_run_by(job).unwrap().is_empty());
        assert_eq!(provider.chunks_run_by(JobId::new(2)).unwrap().len(), 1);
    }
}
