use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use metrics::counter;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::site";

struct CacheEntry {
    serialized: String,
    stored_at: Instant,
}

/// Hostname → serialized site configuration.
///
/// The lock is taken for each access only and never held across store I/O, so two
/// requests may race to populate the same host. The last write wins.
pub struct SiteConfigCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl SiteConfigCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn get(&self, host: &str) -> Option<String> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let fresh = match entries.get(host) {
            None => false,
            Some(entry) => self
                .ttl
                .is_none_or(|ttl| entry.stored_at.elapsed() < ttl),
        };
        if fresh {
            counter!("sitehook_site_cache_hit_total").increment(1);
            return entries.get(host).map(|entry| entry.serialized.clone());
        }
        if entries.remove(host).is_some() {
            counter!("sitehook_site_cache_evict_total").increment(1);
        }
        counter!("sitehook_site_cache_miss_total").increment(1);
        None
    }

    pub fn put(&self, host: &str, serialized: String) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "put");
        entries.insert(
            host.to_string(),
            CacheEntry {
                serialized,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for `host`; returns whether one was present.
    pub fn evict(&self, host: &str) -> bool {
        let removed = mutex_lock(&self.entries, SOURCE, "evict")
            .remove(host)
            .is_some();
        if removed {
            counter!("sitehook_site_cache_evict_total").increment(1);
        }
        removed
    }

    pub fn clear(&self) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "clear");
        let count = entries.len() as u64;
        entries.clear();
        counter!("sitehook_site_cache_evict_total").increment(count);
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SiteConfigCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn stores_one_entry_per_host() {
        let cache = SiteConfigCache::default();
        assert!(cache.get("a.example").is_none());

        cache.put("a.example", "{}".to_string());
        cache.put("a.example", r#"{"v":2}"#.to_string());
        cache.put("b.example", "{}".to_string());

        assert_eq!(cache.get("a.example").as_deref(), Some(r#"{"v":2}"#));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn eviction_is_explicit() {
        let cache = SiteConfigCache::default();
        cache.put("a.example", "{}".to_string());

        assert!(cache.evict("a.example"));
        assert!(!cache.evict("a.example"));
        assert!(cache.get("a.example").is_none());

        cache.put("a.example", "{}".to_string());
        cache.put("b.example", "{}".to_string());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = SiteConfigCache::new(Some(Duration::ZERO));
        cache.put("a.example", "{}".to_string());

        assert!(cache.get("a.example").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_populates_converge() {
        let cache = Arc::new(SiteConfigCache::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.put("race.example", "{}".to_string()))
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("race.example").as_deref(), Some("{}"));
    }
}
