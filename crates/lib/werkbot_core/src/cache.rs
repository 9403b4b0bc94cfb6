//! In-memory map with per-entry TTL and a size bound.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};

/// Default upper bound on live entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// A cached entry with expiry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Expiring key/value map.
///
/// Expired entries are invisible to readers and reclaimed lazily: on
/// [`TtlCache::purge_expired`] and whenever an insert hits the size bound.
/// At the bound with nothing expired, the entry closest to expiry is evicted.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    default_ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_capacity_bound(default_ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity_bound(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Get a cached value if it exists and has not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.live_entry(key).map(|entry| entry.value.clone())
    }

    /// Expiry of a live entry.
    pub fn expires_at(&self, key: &K) -> Option<DateTime<Utc>> {
        self.live_entry(key).map(|entry| entry.expires_at)
    }

    /// Insert or replace with the default TTL.
    pub fn set(&mut self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or replace with an explicit TTL.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }
        let expires_at = Utc::now() + ttl;
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Replace the value of a live entry, keeping its expiry. Returns `false`
    /// when there is no live entry.
    pub fn replace(&mut self, key: &K, value: V) -> bool {
        let now = Utc::now();
        match self.entries.get_mut(key) {
            Some(entry) if now < entry.expires_at => {
                entry.value = value;
                true
            }
            _ => false,
        }
    }

    /// Remove a specific entry.
    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before - self.entries.len()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_entry(&self, key: &K) -> Option<&CacheEntry<V>> {
        let now = Utc::now();
        self.entries.get(key).filter(|entry| now < entry.expires_at)
    }

    fn make_room(&mut self) {
        if self.purge_expired() > 0 {
            return;
        }
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}
