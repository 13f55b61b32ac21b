//! Error types for the Bangumi API client

use std::fmt;

/// Errors that can occur when talking to the Bangumi API
#[derive(Debug)]
pub enum BangumiError {
    /// HTTP request failed (connect, timeout, body read)
    Http(reqwest::Error),
    /// Response body was not the expected JSON
    Json(serde_json::Error),
    /// Non-success status other than 429
    Status { code: u16, body: String },
    /// HTTP 429; the client has already backed off
    RateLimited,
}

impl fmt::Display for BangumiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "Bangumi HTTP error: {}", e),
            Self::Json(e) => write!(f, "Bangumi JSON parse error: {}", e),
            Self::Status { code, body } => write!(f, "Bangumi returned {}: {}", code, body),
            Self::RateLimited => write!(f, "Bangumi rate limit exceeded"),
        }
    }
}

impl std::error::Error for BangumiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BangumiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<serde_json::Error> for BangumiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl BangumiError {
    /// Whether a later identical request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited => true,
            Self::Status { code, .. } => *code >= 500,
            Self::Json(_) => false,
        }
    }
}

/// Result type for Bangumi API operations
pub type Result<T> = std::result::Result<T, BangumiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = BangumiError::Status {
            code: 404,
            body: "Not Found".to_string(),
        };
        assert_eq!(format!("{}", err), "Bangumi returned 404: Not Found");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(BangumiError::RateLimited.is_retryable());
        assert!(BangumiError::Status {
            code: 503,
            body: String::new()
        }
        .is_retryable());
    }
}
