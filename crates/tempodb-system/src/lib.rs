//! # tempodb-system
//!
//! System catalog providers for the scheduler's persisted state:
//! - `JobsProvider`: job rows and id allocation
//! - `JobStatsProvider`: per-job execution history
//! - `ChunkStatsProvider`: per-job, per-chunk run records

pub mod providers;

pub use providers::{ChunkStatsProvider, JobStatsProvider, JobsProvider};
