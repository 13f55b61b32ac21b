//! File-backed artifact storage with an atomically rewritten index

use crate::error::Result;
use crate::types::{ArtifactKey, ArtifactRecord, ArtifactStats};
use catalog_clock::{Clock, SystemClock};
use chrono::Duration;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";

/// Poster cache keyed by [`ArtifactKey`]
pub struct ArtifactCache {
    /// In-memory copy of the index; the write lock is held across every
    /// artifact file change and index rewrite
    index: RwLock<HashMap<ArtifactKey, ArtifactRecord>>,
    /// Directory holding the index and one sub-directory per kind
    root: PathBuf,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    healed: AtomicU64,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            root: root.into(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            healed: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory and load the persisted index
    ///
    /// An unreadable index is logged and replaced by an empty one.
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let records: Vec<ArtifactRecord> = match fs::read(self.index_path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(root = ?self.root, error = %e, "Artifact index unreadable, starting empty");
                Vec::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut index = self.index.write().await;
        *index = records
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect();
        info!(root = ?self.root, entries = index.len(), "Artifact cache initialized");
        Ok(())
    }

    /// Where `key` is (or would be) stored
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.kind.as_str()).join(key.file_name())
    }

    /// Whether a record exists and its file is still on disk
    pub async fn has(&self, key: &ArtifactKey) -> bool {
        let Some(record) = self.record(key).await else {
            return false;
        };
        match fs::try_exists(&record.file_path).await {
            Ok(true) => true,
            _ => {
                self.heal(&record).await;
                false
            }
        }
    }

    /// Read an artifact's bytes
    ///
    /// A record whose file is missing is dropped from the index and reported
    /// as a miss.
    pub async fn get(&self, key: &ArtifactKey) -> Option<Vec<u8>> {
        let Some(record) = self.record(key).await else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        match fs::read(&record.file_path).await {
            Ok(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, size = data.len(), "Artifact hit");
                Some(data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.heal(&record).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read artifact");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an artifact, replacing any previous one with the same key
    pub async fn put(&self, key: &ArtifactKey, data: &[u8]) -> Result<ArtifactRecord> {
        let path = self.path_for(key);

        let mut index = self.index.write().await;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let tmp = path.with_extension("png.tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &path).await?;

        let record = ArtifactRecord {
            key: key.clone(),
            file_path: path,
            created_at: self.clock.now(),
            size: data.len() as u64,
        };

        let previous = index.insert(key.clone(), record.clone());
        if let Err(e) = self.persist(&index).await {
            match previous {
                Some(previous) => index.insert(key.clone(), previous),
                None => index.remove(key),
            };
            return Err(e);
        }

        info!(key = %key, size = record.size, "Stored artifact");
        Ok(record)
    }

    /// Delete an artifact; returns whether a record existed
    pub async fn remove(&self, key: &ArtifactKey) -> Result<bool> {
        let mut index = self.index.write().await;
        let Some(record) = index.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&index).await {
            index.insert(key.clone(), record);
            return Err(e);
        }

        remove_file_if_present(&record.file_path).await;
        debug!(key = %key, "Removed artifact");
        Ok(true)
    }

    /// All records, newest first
    pub async fn list(&self) -> Vec<ArtifactRecord> {
        let mut records: Vec<ArtifactRecord> = self.index.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.key.to_string().cmp(&b.key.to_string()))
        });
        records
    }

    /// Remove every record created more than `max_age_days` ago
    ///
    /// Files already missing from disk are tolerated. Returns the number of
    /// records removed.
    pub async fn cleanup(&self, max_age_days: u32) -> Result<usize> {
        let cutoff = self.clock.now() - Duration::days(i64::from(max_age_days));

        let mut index = self.index.write().await;
        let expired: Vec<ArtifactRecord> = index
            .values()
            .filter(|record| record.created_at < cutoff)
            .cloned()
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        for record in &expired {
            index.remove(&record.key);
        }
        if let Err(e) = self.persist(&index).await {
            for record in expired {
                index.insert(record.key.clone(), record);
            }
            return Err(e);
        }

        for record in &expired {
            remove_file_if_present(&record.file_path).await;
        }

        info!(removed = expired.len(), max_age_days, "Cleaned up old artifacts");
        Ok(expired.len())
    }

    pub async fn stats(&self) -> ArtifactStats {
        let index = self.index.read().await;
        ArtifactStats {
            entries: index.len(),
            total_size: index.values().map(|record| record.size).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            healed: self.healed.load(Ordering::Relaxed),
        }
    }

    async fn record(&self, key: &ArtifactKey) -> Option<ArtifactRecord> {
        self.index.read().await.get(key).cloned()
    }

    /// Drop a record whose file has disappeared
    async fn heal(&self, stale: &ArtifactRecord) {
        let mut index = self.index.write().await;
        // Only if it was not replaced while the lock was released
        if index.get(&stale.key) != Some(stale) {
            return;
        }
        index.remove(&stale.key);
        self.healed.fetch_add(1, Ordering::Relaxed);
        warn!(key = %stale.key, path = ?stale.file_path, "Artifact file missing, dropped index record");

        if let Err(e) = self.persist(&index).await {
            warn!(error = %e, "Failed to persist healed artifact index");
        }
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Rewrite the index file via temp file and rename; caller holds the write lock
    async fn persist(&self, index: &HashMap<ArtifactKey, ArtifactRecord>) -> Result<()> {
        let mut records: Vec<&ArtifactRecord> = index.values().collect();
        records.sort_by_key(|record| record.created_at);

        let path = self.index_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&records)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

async fn remove_file_if_present(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = ?path, "Artifact file already gone");
        }
        Err(e) => warn!(path = ?path, error = %e, "Failed to delete artifact file"),
    }
}
