//! LRU storage for layout documents.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use tracing::{debug, warn};

use crate::config::CacheSettings;
use crate::domain::layout::LayoutDocument;

use super::keys::LayoutCacheKey;

pub const METRIC_LAYOUT_CACHE_HIT: &str = "pumpkin_layout_cache_hit_total";
pub const METRIC_LAYOUT_CACHE_MISS: &str = "pumpkin_layout_cache_miss_total";
pub const METRIC_LAYOUT_CACHE_EVICT: &str = "pumpkin_layout_cache_evict_total";

struct CachedLayout {
    document: LayoutDocument,
    stored_at: Instant,
}

/// Layout documents keyed by [`LayoutCacheKey`], evicted by capacity and age.
pub struct LayoutCache {
    // `LruCache::get` reorders entries, so reads need exclusive access too.
    entries: Mutex<LruCache<LayoutCacheKey, CachedLayout>>,
    ttl: Duration,
}

impl LayoutCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(settings.capacity)),
            ttl: settings.ttl,
        }
    }

    /// Fresh document for `key`. Expired entries are dropped on the way.
    pub fn get(&self, key: &LayoutCacheKey) -> Option<LayoutDocument> {
        let mut entries = self.lock_entries("get");
        let fresh = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.document.clone()),
            Some(_) => {
                entries.pop(key);
                debug!(
                    target = "pumpkin::cache",
                    handler = key.handler(),
                    key = key.fingerprint(),
                    "Layout cache entry expired"
                );
                None
            }
            None => None,
        };

        match fresh {
            Some(document) => {
                counter!(METRIC_LAYOUT_CACHE_HIT).increment(1);
                Some(document)
            }
            None => {
                counter!(METRIC_LAYOUT_CACHE_MISS).increment(1);
                None
            }
        }
    }

    pub fn put(&self, key: LayoutCacheKey, document: LayoutDocument) {
        let entry = CachedLayout {
            document,
            stored_at: Instant::now(),
        };
        let mut entries = self.lock_entries("put");
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!(METRIC_LAYOUT_CACHE_EVICT).increment(1);
        }
    }

    pub fn len(&self) -> usize {
        self.lock_entries("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A panic while holding the lock leaves a usable LRU behind; keep serving.
    fn lock_entries(&self, op: &'static str) -> MutexGuard<'_, LruCache<LayoutCacheKey, CachedLayout>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!(
                target = "pumpkin::cache",
                op,
                "Recovered poisoned layout cache lock"
            );
            PoisonError::into_inner(poisoned)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    fn settings(capacity: usize, ttl: Duration) -> CacheSettings {
        CacheSettings {
            enabled: true,
            capacity: NonZeroUsize::new(capacity).expect("non-zero"),
            ttl,
        }
    }

    fn document(name: &str) -> LayoutDocument {
        LayoutDocument::from_json(&format!(r#"{{"name":"{name}","components":[]}}"#))
            .expect("valid layout")
    }

    fn key(path: &str) -> LayoutCacheKey {
        LayoutCacheKey::new("default", &[("item".to_string(), path.to_string())])
    }

    #[test]
    fn stores_and_returns_documents() {
        let cache = LayoutCache::new(&settings(4, Duration::from_secs(60)));
        assert!(cache.get(&key("/")).is_none());

        cache.put(key("/"), document("home"));
        let hit = cache.get(&key("/")).expect("cached");
        assert_eq!(hit.name.as_deref(), Some("home"));
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = LayoutCache::new(&settings(1, Duration::from_secs(60)));
        cache.put(key("/a"), document("a"));
        cache.put(key("/b"), document("b"));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key("/a")).is_none());
        assert!(cache.get(&key("/b")).is_some());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = LayoutCache::new(&settings(4, Duration::from_millis(1)));
        cache.put(key("/"), document("home"));
        std::thread::sleep(Duration::from_millis(10));

        assert!(cache.get(&key("/")).is_none());
        assert!(cache.is_empty());
    }
}
