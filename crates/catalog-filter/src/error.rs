//! Error types for blacklist mutation and persistence

use std::fmt;

#[derive(Debug)]
pub enum FilterError {
    /// Pattern was empty after trimming
    EmptyPattern,
    /// Rule kind name not recognised
    UnknownKind(String),
    Io(Box<std::io::Error>),
    Serialization(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::EmptyPattern => write!(f, "Blacklist pattern must not be empty"),
            FilterError::UnknownKind(kind) => write!(f, "Unknown rule kind: {}", kind),
            FilterError::Io(err) => write!(f, "IO error: {}", err),
            FilterError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FilterError {
    fn from(err: std::io::Error) -> Self {
        FilterError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for FilterError {
    fn from(err: serde_json::Error) -> Self {
        FilterError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_display() {
        assert_eq!(
            format!("{}", FilterError::EmptyPattern),
            "Blacklist pattern must not be empty"
        );
    }

    #[test]
    fn test_unknown_kind_display() {
        let err = FilterError::UnknownKind("genre".to_string());
        assert_eq!(format!("{}", err), "Unknown rule kind: genre");
    }
}
