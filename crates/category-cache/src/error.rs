//! Error types for cache population

use std::fmt;
use std::time::Duration;

/// Why a population produced no value
///
/// Cloneable so a single failure can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The upstream collaborator (or the filter pipeline) reported an error
    Upstream(String),
    /// The population did not finish within the configured timeout
    Timeout(Duration),
    /// The population task panicked or was cancelled by the runtime
    Aborted(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Upstream(msg) => write!(f, "Upstream unavailable: {}", msg),
            FetchError::Timeout(after) => write!(f, "Upstream timed out after {:?}", after),
            FetchError::Aborted(msg) => write!(f, "Population aborted: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

pub type Result<T> = std::result::Result<T, FetchError>;
