//! Artifact keys, records and statistics

use crate::error::{ArtifactError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_VARIANT: &str = "default";

/// Type of generated artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Daily,
    Weekly,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Daily => "daily",
            ArtifactKind::Weekly => "weekly",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(ArtifactKind::Daily),
            "weekly" => Ok(ArtifactKind::Weekly),
            other => Err(ArtifactError::InvalidKey(format!("unknown kind '{}'", other))),
        }
    }
}

/// Identity of an artifact: `(kind, period, variant)`
///
/// Period is `YYYYMMDD` for daily posters and `YYYY-Www` for weekly ones.
/// Components are restricted to ASCII alphanumerics, `-` and `_` so the
/// derived file name is always a single safe path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub kind: ArtifactKind,
    pub period: String,
    pub variant: String,
}

impl ArtifactKey {
    pub fn new(
        kind: ArtifactKind,
        period: impl Into<String>,
        variant: impl Into<String>,
    ) -> Result<Self> {
        let period = period.into();
        let variant = variant.into();
        validate_component("period", &period)?;
        validate_component("variant", &variant)?;
        Ok(Self {
            kind,
            period,
            variant,
        })
    }

    /// Daily poster key for `date`
    pub fn daily(date: NaiveDate) -> Self {
        Self {
            kind: ArtifactKind::Daily,
            period: date.format("%Y%m%d").to_string(),
            variant: DEFAULT_VARIANT.to_string(),
        }
    }

    /// Weekly poster key for the ISO week containing `date`
    pub fn weekly(date: NaiveDate) -> Self {
        let week = date.iso_week();
        Self {
            kind: ArtifactKind::Weekly,
            period: format!("{}-W{:02}", week.year(), week.week()),
            variant: DEFAULT_VARIANT.to_string(),
        }
    }

    pub fn with_variant(self, variant: impl Into<String>) -> Result<Self> {
        Self::new(self.kind, self.period, variant)
    }

    /// File name under the kind directory
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.png", self.kind, self.period, self.variant)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.period, self.variant)
    }
}

fn validate_component(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ArtifactError::InvalidKey(format!("{} is empty", name)));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ArtifactError::InvalidKey(format!(
            "{} '{}' contains unsupported characters",
            name, value
        )));
    }
    Ok(())
}

/// Index entry for one stored artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub key: ArtifactKey,
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
    pub healed: u64,
}
