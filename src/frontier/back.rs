//! Per-host back queues
//!
//! Every host is pinned to one of N buckets (`host_hash(host) % N`) the
//! first time it is seen, so all of its URLs pass through the same FIFO.
//! Consumers dequeue round-robin across buckets.

use crate::url::{extract_host, host_hash};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use url::Url;

/// Index of a back-queue bucket, displayed as `b0`, `b1`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackQueueId(pub usize);

impl fmt::Display for BackQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Why a URL could not be placed in a back queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("URL has no host")]
    MissingHost,

    #[error("Back queue {0} is full")]
    Full(BackQueueId),
}

/// Fixed set of bounded per-host FIFO buckets
#[derive(Debug)]
pub struct BackQueues {
    buckets: RwLock<Vec<VecDeque<Url>>>,
    /// Memoized host -> bucket assignment
    mapping: RwLock<HashMap<String, BackQueueId>>,
    capacity: usize,
    cursor: AtomicUsize,
}

impl BackQueues {
    pub fn new(count: usize, capacity: usize) -> Self {
        let count = count.max(1);
        Self {
            buckets: RwLock::new((0..count).map(|_| VecDeque::new()).collect()),
            mapping: RwLock::new(HashMap::new()),
            capacity,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Returns the bucket a host is pinned to, assigning it on first use
    pub fn bucket_for(&self, host: &str) -> BackQueueId {
        if let Some(id) = self.mapping.read().get(host) {
            return *id;
        }

        let count = self.count() as u64;
        *self
            .mapping
            .write()
            .entry(host.to_string())
            .or_insert_with(|| BackQueueId((host_hash(host) % count) as usize))
    }

    /// Appends a URL to its host's bucket without blocking
    ///
    /// # Returns
    ///
    /// * `Ok(BackQueueId)` - The bucket that received the URL
    /// * `Err(RouteError::Full)` - The bucket is at capacity; the URL is not queued
    /// * `Err(RouteError::MissingHost)` - The URL has no host
    pub fn route(&self, url: &Url) -> Result<BackQueueId, RouteError> {
        let host = extract_host(url).ok_or(RouteError::MissingHost)?;
        let id = self.bucket_for(&host);

        let mut buckets = self.buckets.write();
        let bucket = &mut buckets[id.0];
        if bucket.len() >= self.capacity {
            return Err(RouteError::Full(id));
        }
        bucket.push_back(url.clone());
        Ok(id)
    }

    /// Takes the head of the next non-empty bucket, starting at the cursor
    ///
    /// The cursor moves past the bucket that was served, so N non-empty
    /// buckets are each served once in N consecutive calls.
    pub fn dequeue(&self) -> Option<Url> {
        let mut buckets = self.buckets.write();
        let count = buckets.len();
        let start = self.cursor.load(Ordering::Relaxed) % count;

        for i in 0..count {
            let idx = (start + i) % count;
            if let Some(url) = buckets[idx].pop_front() {
                self.cursor.store((idx + 1) % count, Ordering::Relaxed);
                return Some(url);
            }
        }
        None
    }

    /// Queued URLs per bucket, keyed by display id
    pub fn sizes(&self) -> BTreeMap<String, usize> {
        self.buckets
            .read()
            .iter()
            .enumerate()
            .map(|(i, b)| (BackQueueId(i).to_string(), b.len()))
            .collect()
    }

    pub fn total_len(&self) -> usize {
        self.buckets.read().iter().map(VecDeque::len).sum()
    }

    /// Number of hosts with a memoized bucket
    pub fn mapping_count(&self) -> usize {
        self.mapping.read().len()
    }

    /// Empties every bucket and forgets all host assignments
    pub fn clear(&self) {
        for bucket in self.buckets.write().iter_mut() {
            bucket.clear();
        }
        self.mapping.write().clear();
        self.cursor.store(0, Ordering::Relaxed);
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.read().iter().all(VecDeque::is_empty)
    }
}
