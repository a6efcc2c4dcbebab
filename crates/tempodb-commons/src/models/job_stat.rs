//! Per-job execution history.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::ids::JobId;
use crate::time::Timestamp;

/// Per-job execution history row.
///
/// Created lazily on the first scheduling event (or when an explicit
/// initial start is seeded) rather than together with the job row. All
/// three fields start out as the unset sentinel.
///
/// `next_start` doubles as the fast-restart channel: a run that leaves
/// more work behind writes its own `last_start` here, which makes the
/// scheduler runtime treat the run as not having happened for scheduling
/// purposes.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct JobStat {
    pub job_id: JobId,
    pub last_start: Timestamp,
    pub last_finish: Timestamp,
    pub next_start: Timestamp,
}

impl JobStat {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            last_start: Timestamp::UNSET,
            last_finish: Timestamp::UNSET,
            next_start: Timestamp::UNSET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stat_is_unset() {
        let stat = JobStat::new(JobId::new(9));
        assert!(stat.last_start.is_unset());
        assert!(stat.last_finish.is_unset());
        assert!(stat.next_start.is_unset());
    }
}
