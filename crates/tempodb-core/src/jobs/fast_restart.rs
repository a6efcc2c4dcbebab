//! Fast-restart controller.
//!
//! Lets a policy ask to be reconsidered immediately instead of waiting a
//! full schedule interval, used when one run cannot finish all pending
//! work (one chunk compressed, more remain). The signal is advisory: the
//! scheduler runtime still applies its own concurrency limits.

use log::debug;
use tempodb_commons::{JobId, Result};

use crate::app_context::AppContext;

/// Request immediate re-invocation of a job.
///
/// With an existing stats row, `next_start` is set back to `last_start`,
/// making the scheduler treat the prior run as not having happened for
/// scheduling purposes. Without one, `next_start` is seeded to now.
pub fn enable_fast_restart(ctx: &AppContext, job_id: JobId, job_name: &str) -> Result<()> {
    match ctx.job_stats().get(&job_id)? {
        Some(stat) => {
            ctx.job_stats().set_next_start(job_id, stat.last_start)?;
        }
        None => {
            ctx.job_stats().upsert_next_start(job_id, ctx.clock().now())?;
        }
    }

    debug!("the {} job is scheduled to run again immediately", job_name);
    Ok(())
}
