//! Priority-tiered front queues
//!
//! Each priority tier is split into `sub_buckets` bounded queues keyed by
//! `tier * 10 + sub_bucket`, where the sub-bucket comes from the host hash.
//! Within one queue URLs are served never-crawled first, then by ascending
//! last-crawl time of their domain.
//!
//! Which tier the drain visits next is driven by the weighted schedule, e.g.
//! `[3, 3, 3, 3, 3, 2, 2, 2, 1]`: tiers that appear more often are more
//! urgent. When a queue is full the admission falls back along an explicit
//! ladder of `(tier, sub_bucket)` candidates built by `fallback_ladder`.

use crate::config::FrontierConfig;
use crate::url::host_hash;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use url::Url;

/// Identifies one front sub-queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrontQueueKey {
    pub tier: u32,
    pub sub_bucket: u32,
}

impl FrontQueueKey {
    pub fn new(tier: u32, sub_bucket: u32) -> Self {
        Self { tier, sub_bucket }
    }

    /// Composite integer form, `tier * 10 + sub_bucket`
    pub fn value(&self) -> u32 {
        self.tier * 10 + self.sub_bucket
    }
}

impl fmt::Display for FrontQueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A URL waiting in a front queue
#[derive(Debug, Clone)]
pub struct QueuedUrl {
    pub url: Url,

    /// Lowercase host of `url`
    pub host: String,

    /// When the URL's domain was last crawled; `None` sorts first
    pub last_crawled: Option<DateTime<Utc>>,

    pub enqueued_at: DateTime<Utc>,

    /// Admission order, breaks ties between equal crawl times
    seq: u64,
}

impl QueuedUrl {
    pub fn new(url: Url, host: String, last_crawled: Option<DateTime<Utc>>) -> Self {
        Self {
            url,
            host,
            last_crawled,
            enqueued_at: Utc::now(),
            seq: 0,
        }
    }
}

// BinaryHeap is a max-heap: the "greatest" item is the one served next
impl Ord for QueuedUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison so None and older crawl times come first
        other
            .last_crawled
            .cmp(&self.last_crawled)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedUrl {}

/// Ranks tiers by how often they appear in the weighted schedule
///
/// Ties go to the larger tier value. The result is most urgent first.
pub fn urgency_ranking(schedule: &[u32]) -> Vec<u32> {
    let mut weights: HashMap<u32, usize> = HashMap::new();
    for tier in schedule {
        *weights.entry(*tier).or_insert(0) += 1;
    }

    let mut tiers: Vec<(u32, usize)> = weights.into_iter().collect();
    tiers.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
    tiers.into_iter().map(|(tier, _)| tier).collect()
}

/// Ordered list of sub-queues to try for an admission
///
/// Starts with the host's own sub-bucket, then the other sub-buckets of the
/// same tier, then the same walk over the next `fallback_tiers` tiers in
/// `ranking` (most urgent first).
///
/// # Arguments
///
/// * `tier` - The domain's (resolved) tier; must appear in `ranking`
/// * `sub_bucket` - The host's sub-bucket within a tier
/// * `sub_buckets` - Sub-buckets per tier
/// * `ranking` - Tiers ordered most urgent first
/// * `fallback_tiers` - How many less urgent tiers to fall back to
pub fn fallback_ladder(
    tier: u32,
    sub_bucket: u32,
    sub_buckets: u32,
    ranking: &[u32],
    fallback_tiers: usize,
) -> Vec<FrontQueueKey> {
    let sub_buckets = sub_buckets.max(1);
    let start = sub_bucket % sub_buckets;

    let position = ranking.iter().position(|t| *t == tier);
    let lower_tiers = position
        .map(|p| &ranking[p + 1..])
        .unwrap_or(&[])
        .iter()
        .take(fallback_tiers);

    std::iter::once(&tier)
        .chain(lower_tiers)
        .flat_map(move |t| {
            (0..sub_buckets).map(move |i| FrontQueueKey::new(*t, (start + i) % sub_buckets))
        })
        .collect()
}

/// One bounded front sub-queue
#[derive(Debug)]
struct FrontQueue {
    heap: BinaryHeap<QueuedUrl>,
    capacity: usize,
}

impl FrontQueue {
    fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            capacity,
        }
    }

    fn offer(&mut self, item: QueuedUrl) -> Result<(), QueuedUrl> {
        if self.heap.len() >= self.capacity {
            return Err(item);
        }
        self.heap.push(item);
        Ok(())
    }
}

/// All front sub-queues plus the weighted drain cursor
#[derive(Debug)]
pub struct FrontQueues {
    queues: RwLock<BTreeMap<FrontQueueKey, FrontQueue>>,
    capacity: usize,
    sub_buckets: u32,
    fallback_tiers: usize,
    schedule: Vec<u32>,
    ranking: Vec<u32>,
    cursor: AtomicUsize,
    seq: AtomicU64,
}

impl FrontQueues {
    pub fn new(config: &FrontierConfig) -> Self {
        Self {
            queues: RwLock::new(BTreeMap::new()),
            capacity: config.front_queue_capacity,
            sub_buckets: config.sub_buckets.max(1),
            fallback_tiers: config.fallback_tiers,
            schedule: config.weighted_schedule.clone(),
            ranking: urgency_ranking(&config.weighted_schedule),
            cursor: AtomicUsize::new(0),
            seq: AtomicU64::new(0),
        }
    }

    /// Sub-bucket of a host within any tier
    pub fn sub_bucket_for(&self, host: &str) -> u32 {
        (host_hash(host) % self.sub_buckets as u64) as u32
    }

    /// Maps a domain priority onto a tier that the schedule actually drains
    ///
    /// # Returns
    ///
    /// `(tier, clamped)`; `clamped` is true when `priority` is not scheduled
    /// and the nearest scheduled tier was chosen instead.
    pub fn resolve_tier(&self, priority: u32) -> (u32, bool) {
        if self.ranking.contains(&priority) {
            return (priority, false);
        }

        let nearest = self
            .ranking
            .iter()
            .copied()
            .min_by(|a, b| {
                a.abs_diff(priority)
                    .cmp(&b.abs_diff(priority))
                    .then(b.cmp(a))
            })
            .unwrap_or(priority);
        (nearest, true)
    }

    /// Candidate sub-queues for a host at a tier, in the order they are tried
    pub fn ladder_for(&self, tier: u32, host: &str) -> Vec<FrontQueueKey> {
        fallback_ladder(
            tier,
            self.sub_bucket_for(host),
            self.sub_buckets,
            &self.ranking,
            self.fallback_tiers,
        )
    }

    /// Offers a URL to one sub-queue, creating the queue on first use
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Queued
    /// * `Err(QueuedUrl)` - The queue is full; the item is handed back
    pub fn push(&self, key: FrontQueueKey, mut item: QueuedUrl) -> Result<(), QueuedUrl> {
        item.seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        let capacity = self.capacity;
        self.queues
            .write()
            .entry(key)
            .or_insert_with(|| FrontQueue::new(capacity))
            .offer(item)
    }

    /// Queues a URL on the first sub-queue of its ladder that has room
    ///
    /// # Returns
    ///
    /// * `Some(key)` - The sub-queue that accepted the URL
    /// * `None` - Every candidate was full
    pub fn enqueue(&self, tier: u32, mut item: QueuedUrl) -> Option<FrontQueueKey> {
        let ladder = self.ladder_for(tier, &item.host);

        for key in ladder {
            match self.push(key, item) {
                Ok(()) => return Some(key),
                Err(rejected) => {
                    tracing::trace!("Front queue {} full for {}", key, rejected.url);
                    item = rejected;
                }
            }
        }
        None
    }

    /// Takes the next URL according to the weighted schedule
    ///
    /// Reads the tier at the cursor and advances it; checks that tier's
    /// sub-queues from a random offset. Gives up after one full pass over
    /// the schedule without finding anything.
    pub fn select_next(&self) -> Option<QueuedUrl> {
        let len = self.schedule.len();
        if len == 0 {
            return None;
        }

        for _ in 0..len {
            let position = self.cursor.fetch_add(1, AtomicOrdering::Relaxed) % len;
            let tier = self.schedule[position];
            let offset = rand::thread_rng().gen_range(0..self.sub_buckets);

            let mut queues = self.queues.write();
            for i in 0..self.sub_buckets {
                let key = FrontQueueKey::new(tier, (offset + i) % self.sub_buckets);
                if let Some(item) = queues.get_mut(&key).and_then(|q| q.heap.pop()) {
                    return Some(item);
                }
            }
        }

        None
    }

    /// Number of URLs in one sub-queue (0 if it was never created)
    pub fn len_of(&self, key: FrontQueueKey) -> usize {
        self.queues.read().get(&key).map_or(0, |q| q.heap.len())
    }

    /// Sizes of every created sub-queue, keyed by composite value
    pub fn sizes(&self) -> BTreeMap<u32, usize> {
        self.queues
            .read()
            .iter()
            .map(|(key, q)| (key.value(), q.heap.len()))
            .collect()
    }

    pub fn total_len(&self) -> usize {
        self.queues.read().values().map(|q| q.heap.len()).sum()
    }

    /// Empties every sub-queue; the queues themselves are kept
    pub fn clear(&self) {
        for queue in self.queues.write().values_mut() {
            queue.heap.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queues.read().values().all(|q| q.heap.is_empty())
    }

    /// Tiers ordered most urgent first
    pub fn ranking(&self) -> &[u32] {
        &self.ranking
    }
}
