//! Application context.
//!
//! Bundles the services the scheduler core works against: the catalog and
//! storage layer seam, the system providers, the procedure registry, the
//! access control seam and the clock. Threaded explicitly through the
//! executors rather than held in process-global state.

use std::sync::Arc;

use tempodb_commons::time::Clock;
use tempodb_store::StorageBackend;
use tempodb_system::{ChunkStatsProvider, JobStatsProvider, JobsProvider};

use crate::access::AccessControl;
use crate::catalog::HypertableStore;
use crate::jobs::registry::ProcedureRegistry;

/// Shared service handle passed to executors and policies.
pub struct AppContext {
    storage: Arc<dyn HypertableStore>,
    jobs: Arc<JobsProvider>,
    job_stats: Arc<JobStatsProvider>,
    chunk_stats: Arc<ChunkStatsProvider>,
    procedures: Arc<ProcedureRegistry>,
    access: Arc<dyn AccessControl>,
    clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Assemble a context over the given catalog seam and backend.
    ///
    /// The system providers share the backend; the procedure registry
    /// starts empty and is populated at startup (see
    /// [`register_builtin_policies`](crate::jobs::policies::register_builtin_policies)).
    pub fn new(
        storage: Arc<dyn HypertableStore>,
        backend: Arc<dyn StorageBackend>,
        access: Arc<dyn AccessControl>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            jobs: Arc::new(JobsProvider::new(backend.clone())),
            job_stats: Arc::new(JobStatsProvider::new(backend.clone())),
            chunk_stats: Arc::new(ChunkStatsProvider::new(backend)),
            procedures: Arc::new(ProcedureRegistry::new()),
            access,
            clock,
        }
    }

    pub fn storage(&self) -> &dyn HypertableStore {
        self.storage.as_ref()
    }

    pub fn jobs(&self) -> &JobsProvider {
        &self.jobs
    }

    pub fn job_stats(&self) -> &JobStatsProvider {
        &self.job_stats
    }

    pub fn chunk_stats(&self) -> &ChunkStatsProvider {
        &self.chunk_stats
    }

    pub fn procedures(&self) -> &ProcedureRegistry {
        &self.procedures
    }

    pub fn access(&self) -> &dyn AccessControl {
        self.access.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
