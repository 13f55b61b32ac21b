//! Error types for the anicast server

use std::fmt;

#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Io(Box<std::io::Error>),
    Artifact(artifact_cache::ArtifactError),
    Filter(catalog_filter::FilterError),
    Scheduler(daily_scheduler::SchedulerError),
    /// Catalog population failed and no stale copy was available
    Fetch(category_cache::FetchError),
    Upstream(bangumi_api::BangumiError),
    /// Render backend missing or failed; callers fall back to text
    Render(String),
    Push(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
            ServerError::Artifact(err) => write!(f, "Artifact cache error: {}", err),
            ServerError::Filter(err) => write!(f, "Blacklist error: {}", err),
            ServerError::Scheduler(err) => write!(f, "Scheduler error: {}", err),
            ServerError::Fetch(err) => write!(f, "Catalog fetch failed: {}", err),
            ServerError::Upstream(err) => write!(f, "Upstream error: {}", err),
            ServerError::Render(msg) => write!(f, "Render unavailable: {}", msg),
            ServerError::Push(msg) => write!(f, "Push delivery failed: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Io(err) => Some(err.as_ref()),
            ServerError::Artifact(err) => Some(err),
            ServerError::Filter(err) => Some(err),
            ServerError::Scheduler(err) => Some(err),
            ServerError::Fetch(err) => Some(err),
            ServerError::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<artifact_cache::ArtifactError> for ServerError {
    fn from(err: artifact_cache::ArtifactError) -> Self {
        ServerError::Artifact(err)
    }
}

impl From<catalog_filter::FilterError> for ServerError {
    fn from(err: catalog_filter::FilterError) -> Self {
        ServerError::Filter(err)
    }
}

impl From<daily_scheduler::SchedulerError> for ServerError {
    fn from(err: daily_scheduler::SchedulerError) -> Self {
        ServerError::Scheduler(err)
    }
}

impl From<category_cache::FetchError> for ServerError {
    fn from(err: category_cache::FetchError) -> Self {
        ServerError::Fetch(err)
    }
}

impl From<bangumi_api::BangumiError> for ServerError {
    fn from(err: bangumi_api::BangumiError) -> Self {
        ServerError::Upstream(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
