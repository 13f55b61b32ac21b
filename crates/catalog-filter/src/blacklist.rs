//! Shared, persisted blacklist

use crate::error::{FilterError, Result};
use crate::rules::{Candidate, RuleKind, RuleSet, Verdict};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Rule set shared between request handlers and scheduled jobs
///
/// Mutations are serialized by `persist` and write the file before the new
/// rule set is published. The read lock is only ever held for a clone or a
/// single evaluation, never across file I/O. Mutating calls do blocking
/// file I/O; async callers should run them on a blocking thread.
pub struct Blacklist {
    rules: RwLock<RuleSet>,
    persist: Mutex<()>,
    /// Where mutations are persisted; `None` keeps rules in memory only
    path: Option<PathBuf>,
}

impl Blacklist {
    pub fn in_memory(rules: RuleSet) -> Self {
        Self {
            rules: RwLock::new(rules),
            persist: Mutex::new(()),
            path: None,
        }
    }

    /// Load persisted rules, or write `seed` if no rule file exists yet
    ///
    /// An unreadable rule file is logged and replaced by `seed`.
    pub fn load_or_init(path: impl Into<PathBuf>, seed: RuleSet) -> Result<Self> {
        let path = path.into();

        let rules = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<RuleSet>(&bytes) {
                Ok(rules) => {
                    info!(path = ?path, "Loaded blacklist rules");
                    rules
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Blacklist file unreadable, reseeding");
                    write_atomic(&path, &seed)?;
                    seed
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = ?path, "No blacklist file, writing seed rules");
                write_atomic(&path, &seed)?;
                seed
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            rules: RwLock::new(rules),
            persist: Mutex::new(()),
            path: Some(path),
        })
    }

    pub fn evaluate<C: Candidate + ?Sized>(&self, item: &C) -> Verdict {
        self.read().evaluate(item)
    }

    pub fn accepts<C: Candidate + ?Sized>(&self, item: &C) -> bool {
        self.evaluate(item).is_accepted()
    }

    /// Keep only accepted items, logging each rejection
    pub fn filter<C: Candidate>(&self, items: Vec<C>) -> Vec<C> {
        let rules = self.read().clone();
        let total = items.len();

        let kept: Vec<C> = items
            .into_iter()
            .filter(|item| match rules.evaluate(item) {
                Verdict::Accepted => true,
                Verdict::Rejected(reason) => {
                    debug!(title = %item.title(), reason = %reason, "Filtered catalog entry");
                    false
                }
            })
            .collect();

        if kept.len() != total {
            info!(total, kept = kept.len(), "Applied blacklist");
        }
        kept
    }

    pub fn snapshot(&self) -> RuleSet {
        self.read().clone()
    }

    pub fn list(&self, kind: RuleKind) -> Vec<String> {
        self.read().list(kind).patterns.iter().cloned().collect()
    }

    /// Add a pattern; returns false if it was already present
    pub fn add(&self, kind: RuleKind, pattern: &str) -> Result<bool> {
        let pattern = normalize(pattern)?;
        self.mutate(|rules| rules.list_mut(kind).patterns.insert(pattern.clone()))
            .inspect(|added| {
                if *added {
                    info!(kind = %kind, pattern = %pattern, "Blacklist pattern added");
                }
            })
    }

    /// Remove a pattern; returns false if it was not present
    pub fn remove(&self, kind: RuleKind, pattern: &str) -> Result<bool> {
        let pattern = normalize(pattern)?;
        self.mutate(|rules| rules.list_mut(kind).patterns.remove(&pattern))
            .inspect(|removed| {
                if *removed {
                    info!(kind = %kind, pattern = %pattern, "Blacklist pattern removed");
                }
            })
    }

    pub fn set_enabled(&self, kind: RuleKind, enabled: bool) -> Result<bool> {
        self.mutate(|rules| {
            let list = rules.list_mut(kind);
            let changed = list.enabled != enabled;
            list.enabled = enabled;
            changed
        })
    }

    pub fn set_origin_filter(&self, enabled: bool) -> Result<bool> {
        self.mutate(|rules| {
            let changed = rules.origin_filter != enabled;
            rules.origin_filter = enabled;
            changed
        })
    }

    pub fn set_master(&self, enabled: bool) -> Result<bool> {
        self.mutate(|rules| {
            let changed = rules.enabled != enabled;
            rules.enabled = enabled;
            changed
        })
    }

    /// Apply `change` to a copy, persist it, then publish it
    fn mutate<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut RuleSet) -> bool,
    {
        let _persist = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = self.read().clone();
        if !change(&mut next) {
            return Ok(false);
        }
        if let Some(path) = &self.path {
            write_atomic(path, &next)?;
        }
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(true)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RuleSet> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize(pattern: &str) -> Result<String> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(FilterError::EmptyPattern);
    }
    Ok(pattern.to_string())
}

fn write_atomic(path: &Path, rules: &RuleSet) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(rules)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleList;
    use tempfile::tempdir;

    struct Title(&'static str);

    impl Candidate for Title {
        fn title(&self) -> &str {
            self.0
        }
    }

    fn keyword_only() -> RuleSet {
        let mut rules = RuleSet::permissive();
        rules.enabled = true;
        rules.keyword = RuleList::enabled_with(Vec::<String>::new());
        rules
    }

    #[test]
    fn test_add_and_remove_keyword_is_immediately_visible() {
        let blacklist = Blacklist::in_memory(keyword_only());
        let item = Title("Show X OVA");
        assert!(blacklist.accepts(&item));

        assert!(blacklist.add(RuleKind::Keyword, "OVA").unwrap());
        assert!(!blacklist.accepts(&item));

        assert!(blacklist.remove(RuleKind::Keyword, "OVA").unwrap());
        assert!(blacklist.accepts(&item));
    }

    #[test]
    fn test_set_semantics() {
        let blacklist = Blacklist::in_memory(keyword_only());
        assert!(blacklist.add(RuleKind::Title, "Isekai").unwrap());
        assert!(!blacklist.add(RuleKind::Title, " Isekai ").unwrap());
        assert!(!blacklist.remove(RuleKind::Title, "missing").unwrap());
        assert_eq!(blacklist.list(RuleKind::Title), vec!["Isekai".to_string()]);
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let blacklist = Blacklist::in_memory(RuleSet::default());
        assert!(matches!(
            blacklist.add(RuleKind::Studio, "   "),
            Err(FilterError::EmptyPattern)
        ));
    }

    #[test]
    fn test_filter_keeps_accepted_items() {
        let blacklist = Blacklist::in_memory(keyword_only());
        blacklist.add(RuleKind::Keyword, "PV").unwrap();

        let kept = blacklist.filter(vec![Title("Main"), Title("Main PV"), Title("Other")]);
        let titles: Vec<&str> = kept.iter().map(|t| t.0).collect();
        assert_eq!(titles, vec!["Main", "Other"]);
    }

    #[test]
    fn test_toggles() {
        let blacklist = Blacklist::in_memory(keyword_only());
        blacklist.add(RuleKind::Keyword, "OVA").unwrap();

        assert!(blacklist.set_enabled(RuleKind::Keyword, false).unwrap());
        assert!(blacklist.accepts(&Title("Show X OVA")));
        assert!(!blacklist.set_enabled(RuleKind::Keyword, false).unwrap());

        blacklist.set_enabled(RuleKind::Keyword, true).unwrap();
        blacklist.set_master(false).unwrap();
        assert!(blacklist.accepts(&Title("Show X OVA")));
        assert!(!blacklist.snapshot().enabled);
    }

    #[test]
    fn test_mutations_persist_across_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blacklist.json");

        let blacklist = Blacklist::load_or_init(&path, RuleSet::default()).unwrap();
        assert!(path.exists());
        blacklist.add(RuleKind::Studio, "Studio Deen").unwrap();
        blacklist.set_origin_filter(false).unwrap();
        blacklist.remove(RuleKind::Keyword, "OVA").unwrap();
        drop(blacklist);

        let reloaded = Blacklist::load_or_init(&path, RuleSet::permissive()).unwrap();
        let rules = reloaded.snapshot();
        assert!(rules.studio.patterns.contains("Studio Deen"));
        assert!(!rules.keyword.patterns.contains("OVA"));
        assert!(!rules.origin_filter);
        assert!(!dir.path().join("blacklist.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_reseeded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blacklist.json");
        std::fs::write(&path, b"{not json").unwrap();

        let blacklist = Blacklist::load_or_init(&path, RuleSet::default()).unwrap();
        assert_eq!(blacklist.snapshot(), RuleSet::default());

        let on_disk: RuleSet = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, RuleSet::default());
    }

    #[test]
    fn test_concurrent_mutations_all_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blacklist.json");
        let blacklist =
            std::sync::Arc::new(Blacklist::load_or_init(&path, keyword_only()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let blacklist = std::sync::Arc::clone(&blacklist);
                std::thread::spawn(move || {
                    blacklist.add(RuleKind::Studio, &format!("Studio {}", i)).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert_eq!(blacklist.list(RuleKind::Studio).len(), 8);
        let on_disk: RuleSet = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, blacklist.snapshot());
    }
}
