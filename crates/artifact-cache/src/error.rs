//! Error types for the artifact cache

use std::fmt;

#[derive(Debug)]
pub enum ArtifactError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    /// A key component was empty or contained characters unsafe for a file name
    InvalidKey(String),
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::Io(err) => write!(f, "IO error: {}", err),
            ArtifactError::Serialization(err) => write!(f, "Index serialization error: {}", err),
            ArtifactError::InvalidKey(msg) => write!(f, "Invalid artifact key: {}", msg),
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::Io(err) => Some(err),
            ArtifactError::Serialization(err) => Some(err),
            ArtifactError::InvalidKey(_) => None,
        }
    }
}

impl From<std::io::Error> for ArtifactError {
    fn from(err: std::io::Error) -> Self {
        ArtifactError::Io(err)
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(err: serde_json::Error) -> Self {
        ArtifactError::Serialization(err)
    }
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_invalid_key_display() {
        let err = ArtifactError::InvalidKey("period is empty".to_string());
        assert_eq!(format!("{}", err), "Invalid artifact key: period is empty");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_io_error_has_source() {
        let err: ArtifactError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(format!("{}", err).starts_with("IO error"));
        assert!(err.source().is_some());
    }
}
