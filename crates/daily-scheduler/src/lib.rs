//! Daily job scheduler
//!
//! A single clock loop compares the local time of day against each
//! registered job's slot and dispatches due jobs as independent tasks. Each
//! job fires at most once per calendar day; the last fired date is persisted
//! so a restart neither double-fires nor skips a slot that already passed
//! today.

mod error;
mod job;
mod scheduler;
mod types;

pub use error::{Result, SchedulerError};
pub use job::{Job, JobResult};
pub use scheduler::Scheduler;
pub use types::{parse_time_of_day, JobState, JobStatus, SchedulerConfig};
