//! # tempodb-core
//!
//! The maintenance scheduler engine: job catalog administration, the job
//! runtime executor with its transaction/snapshot framing, the procedure
//! registry, and the four built-in maintenance policies (retention,
//! reorder, compression, continuous-aggregate refresh).
//!
//! The scheduler runtime that polls due times and enforces retry/backoff,
//! and the storage engine behind the catalog seam, are external
//! collaborators reached through the traits in [`catalog`] and
//! [`access`].

pub mod access;
pub mod app_context;
pub mod catalog;
pub mod jobs;
pub mod test_utils;
pub mod txn;

pub use access::{AccessControl, AllowAll};
pub use app_context::AppContext;
pub use jobs::{AddJob, AlterJob, AlteredJob, JobsManager};
pub use txn::TxnSession;
