//! Category cache facade with single-flight population

use crate::error::{FetchError, Result};
use crate::types::{CacheConfig, Category, FacadeStats, Fetched, Freshness};
use catalog_clock::{Clock, SystemClock};
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use ttl_store::TtlStore;

type Population<V> = Shared<BoxFuture<'static, Result<Arc<V>>>>;

struct Inner<V> {
    store: TtlStore<V>,
    config: CacheConfig,
    /// Last successful value per slot, served when a refresh fails
    last_good: Cache<String, Arc<V>>,
    /// Populations currently running, by slot
    in_flight: Mutex<HashMap<String, Population<V>>>,
    populations: AtomicU64,
}

/// Cache facade assigning a TTL per category and deduplicating populations
///
/// Cloning is cheap; clones share the same store and in-flight table.
pub struct CategoryCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for CategoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + Sync + 'static> CategoryCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let last_good = Cache::builder()
            .max_capacity(config.max_size.max(1) as u64)
            .time_to_live(config.stale_ttl)
            .build();

        Self {
            inner: Arc::new(Inner {
                store: TtlStore::with_clock(config.max_size, clock),
                config,
                last_good,
                in_flight: Mutex::new(HashMap::new()),
                populations: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Return the live value for `(category, key)`, populating it on a miss
    ///
    /// `populate` is invoked only if this call starts the population; callers
    /// that find one in flight wait for it instead.
    pub async fn fetch<F, Fut, E>(&self, category: Category, key: &str, populate: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.fetch_inner(category, key, false, populate).await
    }

    /// Like [`fetch`](Self::fetch) but ignores a live entry
    ///
    /// Still joins a population that is already in flight for the key.
    pub async fn refresh<F, Fut, E>(&self, category: Category, key: &str, populate: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.fetch_inner(category, key, true, populate).await
    }

    /// Fetch, falling back to the last-known-good value if population fails
    pub async fn fetch_or_stale<F, Fut, E>(
        &self,
        category: Category,
        key: &str,
        force_refresh: bool,
        populate: F,
    ) -> Result<Fetched<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        match self.fetch_inner(category, key, force_refresh, populate).await {
            Ok(value) => Ok(Fetched {
                value,
                freshness: Freshness::Fresh,
            }),
            Err(err) => {
                let slot = slot_key(category, key);
                match self.inner.last_good.get(&slot).await {
                    Some(value) => {
                        warn!(slot = %slot, error = %err, "Serving stale value after failed population");
                        Ok(Fetched {
                            value,
                            freshness: Freshness::Stale,
                        })
                    }
                    None => Err(err),
                }
            }
        }
    }

    async fn fetch_inner<F, Fut, E>(
        &self,
        category: Category,
        key: &str,
        force_refresh: bool,
        populate: F,
    ) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let slot = slot_key(category, key);

        if !force_refresh {
            if let Some(value) = self.inner.store.get(&slot).await {
                return Ok(value);
            }
        }

        let population = {
            let mut in_flight = self.inner.in_flight.lock().await;

            // A finished entry means its task died before deregistering
            let running = in_flight
                .get(&slot)
                .filter(|population| population.peek().is_none())
                .cloned();

            match running {
                Some(existing) => {
                    debug!(slot = %slot, "Joining in-flight population");
                    existing
                }
                None => {
                    // The population task stores its value before it
                    // deregisters, so an absent slot means the store is current
                    if !force_refresh {
                        if let Some(value) = self.inner.store.get(&slot).await {
                            return Ok(value);
                        }
                    }
                    let population = self.spawn_population(category, slot.clone(), populate());
                    in_flight.insert(slot, population.clone());
                    population
                }
            }
        };

        population.await
    }

    /// Run a population on its own task so it completes even if every caller goes away
    fn spawn_population<Fut, E>(&self, category: Category, slot: String, work: Fut) -> Population<V>
    where
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let ttl = inner.config.ttls.ttl_for(category);
        let timeout = inner.config.populate_timeout;
        inner.populations.fetch_add(1, Ordering::Relaxed);

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(timeout, work).await {
                Ok(Ok(value)) => {
                    let value = Arc::new(value);
                    inner.store.put_shared(slot.clone(), Arc::clone(&value), ttl).await;
                    inner.last_good.insert(slot.clone(), Arc::clone(&value)).await;
                    info!(
                        category = %category,
                        slot = %slot,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        ttl_secs = ttl.as_secs(),
                        "Populated cache entry"
                    );
                    Ok(value)
                }
                Ok(Err(e)) => {
                    warn!(category = %category, slot = %slot, error = %e, "Population failed");
                    Err(FetchError::Upstream(e.to_string()))
                }
                Err(_) => {
                    warn!(category = %category, slot = %slot, timeout = ?timeout, "Population timed out");
                    Err(FetchError::Timeout(timeout))
                }
            };

            inner.in_flight.lock().await.remove(&slot);
            outcome
        });

        handle
            .map(|joined| joined.unwrap_or_else(|e| Err(FetchError::Aborted(e.to_string()))))
            .boxed()
            .shared()
    }

    /// Drop a cached value and its stale fallback
    pub async fn invalidate(&self, category: Category, key: &str) -> bool {
        let slot = slot_key(category, key);
        self.inner.last_good.invalidate(&slot).await;
        self.inner.store.invalidate(&slot).await
    }

    /// Sweep expired entries out of the store
    pub async fn purge_expired(&self) -> usize {
        self.inner.store.purge_expired().await
    }

    pub async fn stats(&self) -> FacadeStats {
        FacadeStats {
            store: self.inner.store.stats().await,
            in_flight: self.inner.in_flight.lock().await.len(),
            populations: self.inner.populations.load(Ordering::Relaxed),
            stale_entries: self.inner.last_good.entry_count(),
        }
    }
}

fn slot_key(category: Category, key: &str) -> String {
    format!("{}:{}", category.as_str(), key)
}
