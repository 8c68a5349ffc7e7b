//! Bounded robots.txt directive cache
//!
//! Entries expire after their TTL and the least recently accessed entry is
//! evicted when the cache is full.

use crate::robots::HostDirectives;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Cached directives for one host
#[derive(Debug, Clone)]
pub struct CachedDirectives {
    pub directives: Arc<HostDirectives>,

    /// When the robots.txt was fetched (or the fetch failed)
    pub fetched_at: DateTime<Utc>,

    pub ttl: Duration,

    /// Logical access clock, larger is more recent
    last_access: u64,
}

impl CachedDirectives {
    pub fn new(directives: HostDirectives, ttl: Duration) -> Self {
        Self {
            directives: Arc::new(directives),
            fetched_at: Utc::now(),
            ttl,
            last_access: 0,
        }
    }

    /// Checks if the entry is older than its TTL
    pub fn is_expired(&self) -> bool {
        self.age() > self.ttl
    }

    /// Returns how long ago the entry was stored
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}

/// Map of robots authority to cached directives, LRU by access
#[derive(Debug)]
pub struct DirectiveCache {
    entries: HashMap<String, CachedDirectives>,
    capacity: usize,
    clock: u64,
}

impl DirectiveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// Returns live directives for a key and marks it as recently used
    ///
    /// Expired entries are removed and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<Arc<HostDirectives>> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.entries.remove(key);
            return None;
        }

        self.clock += 1;
        let clock = self.clock;
        let entry = self.entries.get_mut(key)?;
        entry.last_access = clock;
        Some(entry.directives.clone())
    }

    /// Stores an entry, evicting the least recently accessed one when full
    ///
    /// # Returns
    ///
    /// The evicted key, if any
    pub fn insert(&mut self, key: String, mut entry: CachedDirectives) -> Option<String> {
        let mut evicted = None;

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());

            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }

        self.clock += 1;
        entry.last_access = self.clock;
        self.entries.insert(key, entry);
        evicted
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
