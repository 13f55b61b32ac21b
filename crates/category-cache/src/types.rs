//! Category, policy and result types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use ttl_store::StoreStats;

/// Class of cached catalog data sharing one TTL policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Weekly broadcast calendar
    Schedule,
    /// Keyword search results
    Search,
    /// Per-title metadata
    Detail,
    /// Per-title episode lists
    Episodes,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Schedule,
        Category::Search,
        Category::Detail,
        Category::Episodes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Schedule => "schedule",
            Category::Search => "search",
            Category::Detail => "detail",
            Category::Episodes => "episodes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed TTL per category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTtls {
    pub schedule: Duration,
    pub search: Duration,
    pub detail: Duration,
    pub episodes: Duration,
}

impl CategoryTtls {
    pub fn ttl_for(&self, category: Category) -> Duration {
        match category {
            Category::Schedule => self.schedule,
            Category::Search => self.search,
            Category::Detail => self.detail,
            Category::Episodes => self.episodes,
        }
    }
}

impl Default for CategoryTtls {
    fn default() -> Self {
        Self {
            schedule: Duration::from_secs(30 * 60),
            search: Duration::from_secs(60 * 60),
            detail: Duration::from_secs(60 * 60),
            episodes: Duration::from_secs(30 * 60),
        }
    }
}

/// Facade configuration, fixed at construction
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttls: CategoryTtls,
    /// Capacity of the underlying TTL store
    pub max_size: usize,
    /// How long a last-known-good value may be served after its TTL lapsed
    pub stale_ttl: Duration,
    /// Upper bound on a single population
    pub populate_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttls: CategoryTtls::default(),
            max_size: 500,
            stale_ttl: Duration::from_secs(24 * 60 * 60),
            populate_timeout: Duration::from_secs(45),
        }
    }
}

/// Whether a value came from a successful population or the fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
        }
    }
}

/// A value returned by [`crate::CategoryCache::fetch_or_stale`]
#[derive(Debug)]
pub struct Fetched<V> {
    pub value: Arc<V>,
    pub freshness: Freshness,
}

impl<V> Clone for Fetched<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            freshness: self.freshness,
        }
    }
}

/// Statistics about the facade
#[derive(Debug, Clone, Serialize)]
pub struct FacadeStats {
    pub store: StoreStats,
    pub in_flight: usize,
    pub populations: u64,
    pub stale_entries: u64,
}
