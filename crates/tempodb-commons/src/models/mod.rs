//! Catalog entities persisted by the scheduler.

mod chunk_stat;
mod job;
mod job_stat;
mod proc_name;
mod role_name;

pub use chunk_stat::{ChunkStat, ChunkStatKey};
pub use job::Job;
pub use job_stat::JobStat;
pub use proc_name::ProcName;
pub use role_name::RoleName;
