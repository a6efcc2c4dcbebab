//! Job catalog entry.
//!
//! Represents a registered background job: a callable target, a schedule,
//! retry metadata for the external scheduler runtime, and an optional
//! policy config document.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, TempoDbError};
use crate::ids::JobId;
use crate::models::{ProcName, RoleName};
use crate::time::Interval;

/// Job catalog entry.
///
/// The row is owned by its creator and mutable only through the alter
/// path's fixed field set. Execution never creates or deletes it; runs
/// only touch the companion [`JobStat`](crate::models::JobStat) row.
///
/// `config` holds the raw JSON text of the policy config document. It is
/// parsed fresh on every use so that the referenced hypertable, index or
/// aggregate is re-resolved against the live catalog each time.
///
/// `max_runtime`, `max_retries` (−1 for unlimited) and `retry_period` are
/// advisory data for the scheduler runtime; nothing in this subsystem
/// enforces them.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub application_name: String,
    pub job_name: String,
    pub schedule_interval: Interval,
    pub max_runtime: Interval,
    pub max_retries: i32,
    pub retry_period: Interval,
    pub proc: ProcName,
    pub owner: RoleName,
    pub scheduled: bool,
    pub config: Option<String>,
}

impl Job {
    /// Create a job with the catalog defaults: unlimited runtime, unlimited
    /// retries, a five minute retry period, and scheduling enabled.
    pub fn new(id: JobId, proc: ProcName, owner: RoleName, schedule_interval: Interval) -> Self {
        Self {
            id,
            application_name: "User-Defined Action".to_string(),
            job_name: "custom".to_string(),
            schedule_interval,
            max_runtime: Interval::ZERO,
            max_retries: -1,
            retry_period: Interval::from_minutes(5),
            proc,
            owner,
            scheduled: true,
            config: None,
        }
    }

    /// Set the config document (stored as JSON text)
    pub fn with_config(mut self, config: &serde_json::Value) -> Self {
        self.config = Some(config.to_string());
        self
    }

    /// Set the display name
    pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    /// Enable or disable periodic scheduling
    pub fn with_scheduled(mut self, scheduled: bool) -> Self {
        self.scheduled = scheduled;
        self
    }

    /// Parse the config document, if any.
    ///
    /// Invalid JSON in the catalog is reported as an invalid parameter so
    /// that an execution attempt surfaces the same error class the admin
    /// API would have raised.
    pub fn parsed_config(&self) -> Result<Option<serde_json::Value>> {
        match &self.config {
            None => Ok(None),
            Some(text) => serde_json::from_str(text).map(Some).map_err(|e| {
                TempoDbError::invalid_parameter(format!(
                    "config for job {} is not valid JSON: {}",
                    self.id, e
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::new(
            JobId::new(1),
            ProcName::new("analytics", "rollup_hourly"),
            RoleName::new("alice"),
            Interval::from_hours(1),
        )
    }

    #[test]
    fn test_defaults() {
        let job = sample_job();
        assert_eq!(job.application_name, "User-Defined Action");
        assert_eq!(job.job_name, "custom");
        assert_eq!(job.max_runtime, Interval::ZERO);
        assert_eq!(job.max_retries, -1);
        assert_eq!(job.retry_period, Interval::from_minutes(5));
        assert!(job.scheduled);
        assert!(job.config.is_none());
    }

    #[test]
    fn test_bincode_round_trip() {
        let job = sample_job().with_config(&serde_json::json!({"hypertable_id": 7}));
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&job, config).unwrap();
        let (decoded, _): (Job, _) = bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(job, decoded);
    }

    #[test]
    fn test_parsed_config() {
        let job = sample_job().with_config(&serde_json::json!({"hypertable_id": 7}));
        let value = job.parsed_config().unwrap().unwrap();
        assert_eq!(value["hypertable_id"], 7);

        assert!(sample_job().parsed_config().unwrap().is_none());
    }

    #[test]
    fn test_parsed_config_rejects_bad_json() {
        let mut job = sample_job();
        job.config = Some("{not json".to_string());
        assert!(matches!(
            job.parsed_config(),
            Err(TempoDbError::InvalidParameter(_))
        ));
    }
}
