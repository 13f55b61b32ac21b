//! In-memory TTL store with bounded capacity

use crate::types::{CacheEntry, StoreStats};
use catalog_clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// A key-value store whose entries expire after a per-entry TTL
pub struct TtlStore<V> {
    /// Entries by key
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    /// Upper bound on the number of stored entries
    max_size: usize,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V> TtlStore<V> {
    /// Create a store reading the system clock
    pub fn new(max_size: usize) -> Self {
        Self::with_clock(max_size, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock
    pub fn with_clock(max_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Look up a live value, removing the entry if it has expired
    pub async fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = self.clock.now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "Store hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Expired under the read lock; a writer may have refreshed it since
        let mut entries = self.entries.write().await;
        let now = self.clock.now();
        if let Some(entry) = entries.get(key) {
            if entry.is_live(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            entries.remove(key);
            debug!(key = %key, "Store entry expired");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or overwrite a value; returns whether it was stored
    pub async fn put(&self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        self.put_shared(key, Arc::new(value), ttl).await
    }

    /// Insert or overwrite an already shared value; returns whether it was stored
    ///
    /// A zero TTL can never produce a live entry, so it only clears the key.
    /// When the store is full the entry with the smallest `expires_at` (ties:
    /// earliest `created_at`) is evicted, unless the incoming entry itself
    /// ranks first, in which case nothing is evicted and it is not stored.
    pub async fn put_shared(&self, key: impl Into<String>, value: Arc<V>, ttl: Duration) -> bool {
        let key = key.into();
        let now = self.clock.now();

        let Some(expires_at) = expiry_for(now, ttl) else {
            let removed = self.entries.write().await.remove(&key).is_some();
            debug!(key = %key, removed, "Zero TTL, entry not stored");
            return false;
        };

        let mut entries = self.entries.write().await;

        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            entries.retain(|_, entry| entry.is_live(now));

            while entries.len() >= self.max_size {
                let victim = entries
                    .values()
                    .min_by_key(|entry| entry.eviction_rank())
                    .map(|entry| (entry.key.clone(), entry.eviction_rank()));

                match victim {
                    Some((victim_key, rank)) if rank <= (expires_at, now) => {
                        entries.remove(&victim_key);
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                        debug!(key = %victim_key, "Evicted soonest-expiring entry");
                    }
                    _ => {
                        debug!(key = %key, "Incoming entry expires first, not stored");
                        return false;
                    }
                }
            }
        }

        entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                created_at: now,
                expires_at,
            },
        );
        true
    }

    /// Remove an entry; returns whether one was present
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Number of live entries (expired entries awaiting lazy removal are not counted)
    pub async fn size(&self) -> usize {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }

    /// Keys of all live entries, sorted
    pub async fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .values()
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop every expired entry now; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.size().await,
            max_size: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

fn expiry_for(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    if ttl.is_zero() {
        return None;
    }
    let expires_at = chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    Some(expires_at)
}
