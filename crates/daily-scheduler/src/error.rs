//! Error types for the scheduler

use std::fmt;

#[derive(Debug)]
pub enum SchedulerError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    /// Time of day not in `HH:MM` form
    InvalidTime(String),
    /// A job with this name is already registered
    DuplicateJob(String),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Io(err) => write!(f, "IO error: {}", err),
            SchedulerError::Serialization(err) => write!(f, "State serialization error: {}", err),
            SchedulerError::InvalidTime(value) => {
                write!(f, "Invalid time of day '{}', expected HH:MM", value)
            }
            SchedulerError::DuplicateJob(name) => write!(f, "Job already registered: {}", name),
        }
    }
}

impl std::error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchedulerError::Io(err) => Some(err),
            SchedulerError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        SchedulerError::Io(err)
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err)
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_time_display() {
        let err = SchedulerError::InvalidTime("25:00".to_string());
        assert_eq!(
            format!("{}", err),
            "Invalid time of day '25:00', expected HH:MM"
        );
    }

    #[test]
    fn test_duplicate_job_display() {
        let err = SchedulerError::DuplicateJob("poster".to_string());
        assert_eq!(format!("{}", err), "Job already registered: poster");
    }
}
