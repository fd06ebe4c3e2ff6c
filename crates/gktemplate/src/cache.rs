/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Content-hash keyed caches shared between scans.
//!
//! Three independent tables are kept: parsed attributes, scanned templates,
//! and raw template file contents. Each table is guarded by its own
//! reader/writer lock, so concurrent renders only contend when a new entry
//! is written.
//!
//! A [`ReloadSwitch`] shared by the tables implements live reload: while it
//! is on, every table behaves as a pass-through (reads miss, writes are
//! dropped) but previously stored entries are kept, so switching it off
//! again resumes reuse without reparsing.

use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::attribute::Attribute;
use crate::template::Template;

/// Storage capability used by the scanner and attribute parser.
pub trait CacheStore<V>: Send + Sync {
    /// Look up an entry. Returns `None` on a miss.
    fn get(&self, key: &str) -> Option<Arc<V>>;

    /// Store an entry, replacing any previous value for the key.
    fn set(&self, key: String, value: Arc<V>);

    /// Discard every entry.
    fn clear(&self);
}

/// Shared live-reload flag, checked at read time by every cache table.
#[derive(Debug, Clone, Default)]
pub struct ReloadSwitch(Arc<AtomicBool>);

impl ReloadSwitch {
    pub fn new(live: bool) -> Self {
        Self(Arc::new(AtomicBool::new(live)))
    }

    /// Whether caches are currently bypassed.
    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set_live(&self, live: bool) {
        self.0.store(live, Ordering::Relaxed);
    }
}

/// In-process cache table.
pub struct MemoryCache<V> {
    items: RwLock<HashMap<String, Arc<V>>>,
    reload: ReloadSwitch,
}

impl<V> MemoryCache<V> {
    pub fn new(reload: ReloadSwitch) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            reload,
        }
    }

    /// Number of stored entries, including ones hidden by live reload.
    pub fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.len())
            .field("live", &self.reload.is_live())
            .finish()
    }
}

impl<V: Send + Sync> CacheStore<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<Arc<V>> {
        if self.reload.is_live() {
            return None;
        }
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let hit = items.get(key).cloned();
        if hit.is_some() {
            tracing::trace!(key, "cache hit");
        }
        hit
    }

    fn set(&self, key: String, value: Arc<V>) {
        if self.reload.is_live() {
            return;
        }
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn clear(&self) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// The three cache tables used by an engine.
///
/// Cloning is cheap and shares the underlying tables, so several engines
/// (or a scanner handed to a handler) can reuse one set of caches.
#[derive(Clone)]
pub struct Caches {
    pub attributes: Arc<dyn CacheStore<Attribute>>,
    pub templates: Arc<dyn CacheStore<Template>>,
    pub files: Arc<dyn CacheStore<String>>,
    reload: ReloadSwitch,
}

impl Caches {
    /// Create in-memory tables controlled by `reload`.
    pub fn new(reload: ReloadSwitch) -> Self {
        Self {
            attributes: Arc::new(MemoryCache::new(reload.clone())),
            templates: Arc::new(MemoryCache::new(reload.clone())),
            files: Arc::new(MemoryCache::new(reload.clone())),
            reload,
        }
    }

    pub fn reload(&self) -> &ReloadSwitch {
        &self.reload
    }

    /// Drop every entry from all three tables.
    pub fn clear(&self) {
        self.attributes.clear();
        self.templates.clear();
        self.files.clear();
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::new(ReloadSwitch::default())
    }
}

impl fmt::Debug for Caches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caches")
            .field("live", &self.reload.is_live())
            .finish_non_exhaustive()
    }
}

/// SHA-1 hex digest over `parts`, separated by NUL bytes.
pub fn content_hash(parts: &[&str]) -> String {
    let mut hasher = Sha1::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let cache: MemoryCache<String> = MemoryCache::new(ReloadSwitch::default());
        assert!(cache.get("a").is_none());
        cache.set("a".to_string(), Arc::new("value".to_string()));
        assert_eq!(cache.get("a").as_deref(), Some(&"value".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache: MemoryCache<u32> = MemoryCache::new(ReloadSwitch::default());
        cache.set("a".to_string(), Arc::new(1));
        cache.set("b".to_string(), Arc::new(2));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_live_reload_bypasses_without_discarding() {
        let reload = ReloadSwitch::default();
        let cache: MemoryCache<u32> = MemoryCache::new(reload.clone());
        cache.set("kept".to_string(), Arc::new(1));

        reload.set_live(true);
        assert!(cache.get("kept").is_none());
        // Writes are dropped while live
        cache.set("dropped".to_string(), Arc::new(2));
        assert_eq!(cache.len(), 1);

        reload.set_live(false);
        assert_eq!(cache.get("kept").as_deref(), Some(&1));
        assert!(cache.get("dropped").is_none());
    }

    #[test]
    fn test_caches_share_switch() {
        let caches = Caches::default();
        caches
            .files
            .set("path".to_string(), Arc::new("content".to_string()));
        caches.reload().set_live(true);
        assert!(caches.files.get("path").is_none());
        caches.reload().set_live(false);
        assert!(caches.files.get("path").is_some());
        caches.clear();
        assert!(caches.files.get("path").is_none());
    }

    #[test]
    fn test_concurrent_readers() {
        let cache: Arc<MemoryCache<usize>> = Arc::new(MemoryCache::new(ReloadSwitch::default()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.set(format!("k{}", i), Arc::new(i));
                    cache.get(&format!("k{}", i)).map(|v| *v)
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Some(i));
        }
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn test_content_hash() {
        // sha1("abc")
        assert_eq!(
            content_hash(&["abc"]),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_ne!(content_hash(&["ab", "c"]), content_hash(&["a", "bc"]));
    }
}
