//! Frontier counters and statistics snapshots
//!
//! `FrontierMetrics` is updated on the hot admission and drain paths, so the
//! totals are plain atomics and only the per-host breakdown takes a lock.

use crate::frontier::RejectReason;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative counters for one host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCounters {
    pub scheduled: u64,
    pub processed: u64,
    pub rejected: u64,
}

/// Live counters shared by admission and the drain scheduler
#[derive(Debug, Default)]
pub struct FrontierMetrics {
    scheduled: AtomicU64,
    processed: AtomicU64,
    rejected: AtomicU64,
    per_host: RwLock<HashMap<String, HostCounters>>,
    rejected_by_reason: RwLock<HashMap<RejectReason, u64>>,
}

impl FrontierMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A URL was accepted into a front queue
    pub fn record_scheduled(&self, host: &str) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        self.per_host
            .write()
            .entry(host.to_string())
            .or_default()
            .scheduled += 1;
    }

    /// A URL was moved from a front queue towards its back queue
    pub fn record_processed(&self, host: &str) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.per_host
            .write()
            .entry(host.to_string())
            .or_default()
            .processed += 1;
    }

    /// A URL was rejected; malformed URLs have no host to attribute
    pub fn record_rejected(&self, host: Option<&str>, reason: RejectReason) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        *self.rejected_by_reason.write().entry(reason).or_insert(0) += 1;

        if let Some(host) = host {
            self.per_host
                .write()
                .entry(host.to_string())
                .or_default()
                .rejected += 1;
        }
    }

    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Counters for one host (zeroes if the host was never seen)
    pub fn host(&self, host: &str) -> HostCounters {
        self.per_host.read().get(host).copied().unwrap_or_default()
    }

    pub fn rejected_for(&self, reason: RejectReason) -> u64 {
        self.rejected_by_reason
            .read()
            .get(&reason)
            .copied()
            .unwrap_or(0)
    }

    fn per_host_snapshot(&self) -> BTreeMap<String, HostCounters> {
        self.per_host
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn rejected_by_reason_snapshot(&self) -> BTreeMap<String, u64> {
        self.rejected_by_reason
            .read()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), *v))
            .collect()
    }
}

/// Point-in-time view of queue sizes and counters
#[derive(Debug, Clone, Default)]
pub struct FrontierStats {
    /// Front sub-queue key (`tier * 10 + sub_bucket`) -> queued URLs
    pub front_queue_sizes: BTreeMap<u32, usize>,

    /// Back-queue id (`b0`..) -> queued URLs
    pub back_queue_sizes: BTreeMap<String, usize>,

    pub total_front: usize,
    pub total_back: usize,

    /// Hosts with a memoized back-queue assignment
    pub host_mappings: usize,

    pub scheduled: u64,
    pub processed: u64,
    pub rejected: u64,

    pub rejected_by_reason: BTreeMap<String, u64>,
    pub per_host: BTreeMap<String, HostCounters>,

    pub retry_pending: usize,
    pub robots_cached_hosts: usize,
}

impl FrontierStats {
    /// Fills in the counter fields from live metrics
    pub fn with_metrics(mut self, metrics: &FrontierMetrics) -> Self {
        self.scheduled = metrics.scheduled();
        self.processed = metrics.processed();
        self.rejected = metrics.rejected();
        self.rejected_by_reason = metrics.rejected_by_reason_snapshot();
        self.per_host = metrics.per_host_snapshot();
        self
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &FrontierStats) {
    println!("=== Frontier Statistics ===\n");

    println!("Overview:");
    println!("  Front queue URLs: {}", stats.total_front);
    println!("  Back queue URLs: {}", stats.total_back);
    println!("  Host mappings: {}", stats.host_mappings);
    println!("  Pending retries: {}", stats.retry_pending);
    println!("  Cached robots.txt hosts: {}", stats.robots_cached_hosts);
    println!();

    println!("Counters:");
    println!("  Scheduled: {}", stats.scheduled);
    println!("  Processed: {}", stats.processed);
    println!("  Rejected: {}", stats.rejected);
    for (reason, count) in &stats.rejected_by_reason {
        println!("    {}: {}", reason, count);
    }
    println!();

    if !stats.front_queue_sizes.is_empty() {
        println!("Front Queues:");
        for (key, size) in &stats.front_queue_sizes {
            println!("  {}: {}", key, size);
        }
        println!();
    }

    if !stats.back_queue_sizes.is_empty() {
        println!("Back Queues:");
        for (id, size) in &stats.back_queue_sizes {
            println!("  {}: {}", id, size);
        }
        println!();
    }

    if !stats.per_host.is_empty() {
        // Busiest hosts first
        let mut hosts: Vec<_> = stats.per_host.iter().collect();
        hosts.sort_by(|a, b| b.1.scheduled.cmp(&a.1.scheduled).then(a.0.cmp(b.0)));

        println!("Hosts ({}):", hosts.len());
        for (host, counters) in hosts {
            println!(
                "  {}: scheduled {}, processed {}, rejected {}",
                host, counters.scheduled, counters.processed, counters.rejected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_per_host() {
        let metrics = FrontierMetrics::new();
        metrics.record_scheduled("a.example");
        metrics.record_scheduled("a.example");
        metrics.record_processed("a.example");
        metrics.record_rejected(Some("b.example"), RejectReason::RobotsDisallowed);
        metrics.record_rejected(None, RejectReason::Malformed);

        assert_eq!(metrics.scheduled(), 2);
        assert_eq!(metrics.processed(), 1);
        assert_eq!(metrics.rejected(), 2);
        assert_eq!(
            metrics.host("a.example"),
            HostCounters {
                scheduled: 2,
                processed: 1,
                rejected: 0
            }
        );
        assert_eq!(metrics.host("b.example").rejected, 1);
        assert_eq!(metrics.host("unseen.example"), HostCounters::default());
        assert_eq!(metrics.rejected_for(RejectReason::Malformed), 1);
    }

    #[test]
    fn test_snapshot_copies_counters() {
        let metrics = FrontierMetrics::new();
        metrics.record_scheduled("a.example");
        metrics.record_rejected(Some("a.example"), RejectReason::UnknownDomain);

        let stats = FrontierStats::default().with_metrics(&metrics);
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.rejected_by_reason.get("unknown-domain"), Some(&1));
        assert_eq!(stats.per_host["a.example"].rejected, 1);
    }
}
