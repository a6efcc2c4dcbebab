//! System catalog providers.

mod chunk_stats_provider;
mod job_stats_provider;
mod jobs_provider;

pub use chunk_stats_provider::ChunkStatsProvider;
pub use job_stats_provider::JobStatsProvider;
pub use jobs_provider::JobsProvider;
