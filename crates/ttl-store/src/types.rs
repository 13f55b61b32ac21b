//! Store entry and statistics types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// A stored value together with its freshness window
///
/// Values are shared behind an `Arc` and never mutated after insertion;
/// callers receive read-only snapshots.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: Arc<V>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// An entry is live strictly before its expiry instant
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Eviction order: soonest expiry first, then oldest insertion
    pub(crate) fn eviction_rank(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.expires_at, self.created_at)
    }
}

/// Statistics about the store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entry_liveness_boundary() {
        let created_at = Utc::now();
        let entry = CacheEntry {
            key: "bangumi:calendar".to_string(),
            value: Arc::new(1u32),
            created_at,
            expires_at: created_at + Duration::seconds(10),
        };

        assert!(entry.is_live(created_at));
        assert!(entry.is_live(created_at + Duration::seconds(9)));
        assert!(!entry.is_live(created_at + Duration::seconds(10)));
    }

    #[test]
    fn test_store_stats_serialization() {
        let stats = StoreStats {
            entries: 3,
            max_size: 500,
            hits: 10,
            misses: 2,
            evictions: 1,
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"max_size\":500"));
        assert!(json.contains("\"evictions\":1"));
    }
}
