//! Scheduler configuration and job status

use crate::error::{Result, SchedulerError};
use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the clock loop wakes
    pub tick: Duration,
    /// How long after its slot a failed job may still be retried the same day
    pub retry_window: chrono::Duration,
    /// Offset in which times of day are evaluated
    pub utc_offset: FixedOffset,
    /// File recording each job's last fired date; `None` keeps it in memory
    pub state_path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(30),
            retry_window: chrono::Duration::minutes(60),
            utc_offset: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
            state_path: None,
        }
    }
}

/// Per-job state machine: `Idle -> Due -> Firing -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Due,
    Firing,
}

/// Point-in-time view of a registered job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub name: String,
    pub time_of_day: NaiveTime,
    pub state: JobState,
    pub last_fired_date: Option<NaiveDate>,
    pub last_failed_date: Option<NaiveDate>,
    pub last_error: Option<String>,
}

/// Parse a `HH:MM` time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| SchedulerError::InvalidTime(value.to_string()))
}
