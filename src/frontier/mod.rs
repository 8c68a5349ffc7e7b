//! The URL frontier
//!
//! This module ties the pieces together:
//! - Admission of incoming URLs against the domain registry and robots.txt
//! - Priority-tiered front queues with a fallback ladder
//! - The weighted drain from front queues into per-host back queues
//! - Round-robin dequeue for whatever issues fetch tasks
//! - The retry set for failed fetches
//! - Periodic service loops (see `scheduler`)

mod admission;
mod back;
mod front;
mod retry;
pub mod scheduler;

pub use admission::{Admitted, RejectReason, Rejection};
pub use back::{BackQueueId, BackQueues, RouteError};
pub use front::{fallback_ladder, urgency_ranking, FrontQueueKey, FrontQueues, QueuedUrl};
pub use retry::{RetryPolicy, RetryRecord, RetryRecordError, RetrySet};
pub use scheduler::spawn_service_loops;

use crate::config::{Config, FrontierConfig};
use crate::registry::{DomainCache, DomainRegistry};
use crate::robots::RobotsCache;
use crate::stats::{FrontierMetrics, FrontierStats};
use crate::url::{extract_host, parse_crawl_url};
use crate::{FrontierError, UrlError};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// The frontier service state
///
/// Front queues, back queues, the host mapping and the retry set each have
/// their own lock, so admission never contends with back-queue dequeue.
pub struct Frontier {
    config: FrontierConfig,
    domains: DomainCache,
    robots: RobotsCache,
    front: FrontQueues,
    back: BackQueues,
    retries: RetrySet,
    retry_policy: RetryPolicy,
    metrics: FrontierMetrics,
    draining: AtomicBool,
    drain_batch_size: usize,
    retry_batch_size: usize,
    admission_permits: Arc<Semaphore>,
}

/// Clears the in-flight flag when a drain cycle ends, even on panic
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Frontier {
    /// Creates a frontier over the given registry and robots cache
    ///
    /// # Arguments
    ///
    /// * `config` - The service configuration
    /// * `registry` - Domain registry consulted on admission
    /// * `robots` - Robots.txt directive cache
    pub fn new(config: &Config, registry: Arc<dyn DomainRegistry>, robots: RobotsCache) -> Self {
        let frontier = &config.frontier;

        Self {
            config: frontier.clone(),
            domains: DomainCache::new(registry),
            robots,
            front: FrontQueues::new(frontier),
            back: BackQueues::new(frontier.back_queue_count, frontier.back_queue_capacity),
            retries: RetrySet::new(),
            retry_policy: RetryPolicy::new(&config.retry),
            metrics: FrontierMetrics::new(),
            draining: AtomicBool::new(false),
            drain_batch_size: config.scheduler.drain_batch_size,
            retry_batch_size: config.scheduler.retry_batch_size,
            admission_permits: Arc::new(Semaphore::new(
                config.scheduler.admission_concurrency.max(1),
            )),
        }
    }

    /// Creates a frontier that fetches robots.txt over HTTP
    pub fn from_config(
        config: &Config,
        registry: Arc<dyn DomainRegistry>,
    ) -> Result<Self, FrontierError> {
        let robots = RobotsCache::from_config(&config.robots, config.frontier.default_crawl_delay)?;
        Ok(Self::new(config, registry, robots))
    }

    /// Validates a URL and places it in a front queue
    ///
    /// Steps: parse, registry lookup, robots.txt check, then enqueue on the
    /// first sub-queue of the domain's fallback ladder with room.
    ///
    /// # Returns
    ///
    /// * `Ok(Admitted)` - Queued; includes the queue used and the crawl delay
    /// * `Err(Rejection)` - Not queued, with the reason
    pub async fn admit(&self, raw: &str) -> Result<Admitted, Rejection> {
        let url = match parse_crawl_url(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Rejected malformed URL '{}': {}", raw.trim(), e);
                return Err(self.reject(None, Rejection::Malformed(e)));
            }
        };

        let Some(host) = extract_host(&url) else {
            return Err(self.reject(None, Rejection::Malformed(UrlError::MissingHost)));
        };

        let domain = match self.domains.get_domain(&host) {
            Ok(Some(domain)) => domain,
            Ok(None) => {
                tracing::debug!("Rejected {}: unknown domain", url);
                return Err(self.reject(Some(&host), Rejection::UnknownDomain(host.clone())));
            }
            Err(e) => {
                tracing::error!("Registry lookup for {} failed: {}", host, e);
                return Err(self.reject(
                    Some(&host),
                    Rejection::RegistryUnavailable(e.to_string()),
                ));
            }
        };

        let directives = self.robots.directives_for(&url).await;
        if !directives.allows(url.as_str()) {
            tracing::debug!("Rejected {}: disallowed by robots.txt", url);
            return Err(self.reject(
                Some(&host),
                Rejection::RobotsDisallowed(url.to_string()),
            ));
        }
        let crawl_delay = directives
            .crawl_delay()
            .unwrap_or(self.config.default_crawl_delay);

        let (tier, clamped) = self.front.resolve_tier(domain.priority);
        if clamped {
            tracing::warn!(
                "Priority {} of {} is not in the weighted schedule, using tier {}",
                domain.priority,
                host,
                tier
            );
        }

        let item = QueuedUrl::new(url.clone(), host.clone(), domain.last_crawled);
        match self.front.enqueue(tier, item) {
            Some(queue) => {
                self.metrics.record_scheduled(&host);
                tracing::debug!("Admitted {} into front queue {}", url, queue);
                Ok(Admitted {
                    url,
                    host,
                    queue,
                    crawl_delay,
                })
            }
            None => {
                tracing::warn!("All front queues full for {}, dropping {}", host, url);
                Err(self.reject(Some(&host), Rejection::AllQueuesFull(url.to_string())))
            }
        }
    }

    /// Admits a list of URLs in parallel
    ///
    /// Each URL runs in its own task; a failure (or panic) affects only that
    /// URL. At most `admission-concurrency` URLs are in flight at once.
    ///
    /// # Returns
    ///
    /// One result per input URL, in input order
    pub async fn admit_batch(
        self: &Arc<Self>,
        urls: Vec<String>,
    ) -> Vec<Result<Admitted, Rejection>> {
        let mut handles = Vec::with_capacity(urls.len());

        for raw in urls {
            let frontier = Arc::clone(self);
            let permits = Arc::clone(&self.admission_permits);
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                frontier.admit(&raw).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Admission task failed: {}", e);
                    Err(self.reject(None, Rejection::Aborted(e.to_string())))
                }
            });
        }
        results
    }

    /// Takes the next URL from the front queues by weighted schedule
    pub fn select_next(&self) -> Option<QueuedUrl> {
        self.front.select_next()
    }

    /// Moves a URL into its host's back queue, dropping it when full
    pub fn route_to_back_queue(&self, url: &Url) -> Option<BackQueueId> {
        match self.back.route(url) {
            Ok(id) => {
                tracing::trace!("Routed {} to back queue {}", url, id);
                Some(id)
            }
            Err(RouteError::Full(id)) => {
                tracing::warn!("Back queue {} full, dropping {}", id, url);
                None
            }
            Err(RouteError::MissingHost) => {
                tracing::warn!("Cannot route {} without a host", url);
                None
            }
        }
    }

    /// Next URL to fetch, round-robin across back queues
    pub fn dequeue_back_queue(&self) -> Option<Url> {
        self.back.dequeue()
    }

    /// Moves up to `drain-batch-size` URLs from front to back queues
    ///
    /// # Returns
    ///
    /// * `Some(n)` - URLs taken from the front queues this cycle
    /// * `None` - Another cycle was still running; this one was skipped
    pub fn run_drain_cycle(&self) -> Option<usize> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Drain cycle still running, skipping");
            return None;
        }
        let _guard = DrainGuard(&self.draining);

        let mut processed = 0;
        while processed < self.drain_batch_size {
            let Some(item) = self.front.select_next() else {
                break;
            };
            self.metrics.record_processed(&item.host);
            self.route_to_back_queue(&item.url);
            processed += 1;
        }

        if processed > 0 {
            tracing::debug!("Drained {} URLs into back queues", processed);
        }
        Some(processed)
    }

    /// Applies the retry policy to a failed fetch
    ///
    /// # Returns
    ///
    /// `true` if the URL was parked for retry, `false` if it was dropped
    pub fn report_failure(&self, record: RetryRecord) -> bool {
        match self.retry_policy.ready_at(&record) {
            Some(ready_at) => {
                tracing::info!(
                    "Retry {} of {} scheduled for {} (status {:?})",
                    record.retry_count,
                    record.url,
                    ready_at,
                    record.http_status
                );
                self.retries.add_retry(record.url, ready_at);
                true
            }
            None => {
                tracing::warn!(
                    "Dropping {} after {} failed attempts",
                    record.url,
                    record.retry_count
                );
                false
            }
        }
    }

    /// Handles one line of the inbound stream
    ///
    /// `retry <url> <count> <rfc3339> [status]` reports a failed fetch to
    /// the retry policy. Any other non-empty line is a newly discovered URL
    /// and goes through admission. Bad lines are logged and skipped.
    pub async fn ingest_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if let Some(record) = line.strip_prefix("retry ") {
            match record.parse::<RetryRecord>() {
                Ok(record) => {
                    self.report_failure(record);
                }
                Err(e) => tracing::warn!("Ignoring retry line '{}': {}", line, e),
            }
            return;
        }

        if let Err(rejection) = self.admit(line).await {
            tracing::debug!("{}", rejection);
        }
    }

    /// Parks a URL for the next retry sweep
    pub fn add_retry(&self, url: Url) {
        self.retries.add_retry(url, Utc::now());
    }

    /// Re-admits up to `retry-batch-size` URLs whose retry time has come
    ///
    /// # Returns
    ///
    /// The number of URLs accepted back into the front queues
    pub async fn sweep_retries(self: &Arc<Self>) -> usize {
        let now = Utc::now();
        let ready: Vec<String> = std::iter::from_fn(|| self.retries.next_retry_ready(now))
            .take(self.retry_batch_size)
            .map(String::from)
            .collect();

        if ready.is_empty() {
            return 0;
        }

        let attempted = ready.len();
        let accepted = count_accepted(&self.admit_batch(ready).await);
        tracing::info!("Retry sweep re-admitted {}/{} URLs", accepted, attempted);
        accepted
    }

    /// Admits the seed URLs of every active domain
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of seeds accepted
    /// * `Err(FrontierError)` - The registry could not be read
    pub async fn schedule_seeds(self: &Arc<Self>) -> Result<usize, FrontierError> {
        let domains = self.domains.registry().find_active()?;
        let seeds: Vec<String> = domains
            .into_iter()
            .flat_map(|domain| domain.seed_urls)
            .collect();

        if seeds.is_empty() {
            tracing::debug!("No active domains to seed");
            return Ok(0);
        }

        let attempted = seeds.len();
        let accepted = count_accepted(&self.admit_batch(seeds).await);
        tracing::info!("Scheduled {}/{} seed URLs", accepted, attempted);
        Ok(accepted)
    }

    /// Admits the seed URLs of one domain
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of seeds accepted
    /// * `Err(FrontierError::UnknownDomain)` - The host is not registered
    pub async fn schedule_domain_seeds(self: &Arc<Self>, host: &str) -> Result<usize, FrontierError> {
        let host = host.trim().to_lowercase();
        let domain = self
            .domains
            .registry()
            .find_by_host(&host)?
            .ok_or_else(|| FrontierError::UnknownDomain(host.clone()))?;

        let accepted = count_accepted(&self.admit_batch(domain.seed_urls).await);
        tracing::info!("Scheduled {} seed URLs for {}", accepted, host);
        Ok(accepted)
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> FrontierStats {
        let front_queue_sizes = self.front.sizes();
        let back_queue_sizes = self.back.sizes();

        FrontierStats {
            total_front: front_queue_sizes.values().sum(),
            total_back: back_queue_sizes.values().sum(),
            front_queue_sizes,
            back_queue_sizes,
            host_mappings: self.back.mapping_count(),
            retry_pending: self.retries.len(),
            robots_cached_hosts: self.robots.cached_hosts(),
            ..FrontierStats::default()
        }
        .with_metrics(&self.metrics)
    }

    /// Empties all front and back queues and the host mapping
    pub fn clear(&self) {
        self.front.clear();
        self.back.clear();
        tracing::info!("Cleared all frontier queues");
    }

    /// True only when every front and back queue is empty
    pub fn is_empty(&self) -> bool {
        self.front.is_empty() && self.back.is_empty()
    }

    pub fn domains(&self) -> &DomainCache {
        &self.domains
    }

    pub fn robots(&self) -> &RobotsCache {
        &self.robots
    }

    pub fn metrics(&self) -> &FrontierMetrics {
        &self.metrics
    }

    pub fn front_queues(&self) -> &FrontQueues {
        &self.front
    }

    pub fn back_queues(&self) -> &BackQueues {
        &self.back
    }

    pub fn retries(&self) -> &RetrySet {
        &self.retries
    }

    fn reject(&self, host: Option<&str>, rejection: Rejection) -> Rejection {
        self.metrics.record_rejected(host, rejection.reason());
        rejection
    }
}

fn count_accepted(results: &[Result<Admitted, Rejection>]) -> usize {
    results.iter().filter(|r| r.is_ok()).count()
}
