//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching
//! robots.txt files. Admission consults it for every URL, so lookups are
//! served from a bounded per-host cache and only a miss (or an expired
//! entry) goes to the network.
//!
//! A robots.txt that cannot be fetched never blocks a host: every failure
//! degrades to permissive directives, which are cached for a shorter TTL.

mod cache;
mod fetcher;
mod parser;

pub use cache::{CachedDirectives, DirectiveCache};
pub use fetcher::{build_http_client, HttpRobotsFetcher, RobotsFetchOutcome, RobotsFetcher};
pub use parser::{HostDirectives, PathRule, RuleKind};

use crate::config::RobotsConfig;
use crate::url::{robots_authority, robots_url};
use chrono::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

type RefetchLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Per-host robots.txt directive cache
pub struct RobotsCache {
    config: RobotsConfig,
    default_crawl_delay: f64,
    fetcher: Arc<dyn RobotsFetcher>,
    entries: Mutex<DirectiveCache>,
    /// One async lock per authority currently being fetched
    refetch_locks: RefetchLocks,
    fetch_permits: Semaphore,
}

impl RobotsCache {
    /// Creates a cache that fetches through the given fetcher
    ///
    /// # Arguments
    ///
    /// * `config` - Robots configuration (agent, cache size, TTLs, limits)
    /// * `default_crawl_delay` - Seconds reported when no delay is declared
    /// * `fetcher` - Issues the actual robots.txt requests
    pub fn new(
        config: RobotsConfig,
        default_crawl_delay: f64,
        fetcher: Arc<dyn RobotsFetcher>,
    ) -> Self {
        let entries = DirectiveCache::new(config.cache_size);
        let fetch_permits = Semaphore::new(config.max_concurrent_fetches.max(1));

        Self {
            config,
            default_crawl_delay,
            fetcher,
            entries: Mutex::new(entries),
            refetch_locks: Mutex::new(HashMap::new()),
            fetch_permits,
        }
    }

    /// Creates a cache backed by the reqwest fetcher
    pub fn from_config(
        config: &RobotsConfig,
        default_crawl_delay: f64,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = HttpRobotsFetcher::from_config(config)?;
        Ok(Self::new(
            config.clone(),
            default_crawl_delay,
            Arc::new(fetcher),
        ))
    }

    /// Checks if a URL may be crawled
    ///
    /// # Returns
    ///
    /// * `true` - Allowed, or robots.txt was unavailable
    /// * `false` - Disallowed for our user agent
    pub async fn allows(&self, url: &Url) -> bool {
        self.directives_for(url).await.allows(url.as_str())
    }

    /// Crawl delay declared by the host's robots.txt, in seconds
    pub async fn crawl_delay(&self, url: &Url) -> Option<f64> {
        self.directives_for(url).await.crawl_delay()
    }

    /// Declared crawl delay, or the configured default
    pub async fn effective_crawl_delay(&self, url: &Url) -> f64 {
        self.crawl_delay(url)
            .await
            .unwrap_or(self.default_crawl_delay)
    }

    /// Returns the directives that govern a URL, fetching on a miss
    pub async fn directives_for(&self, url: &Url) -> Arc<HostDirectives> {
        if !self.config.enabled {
            return Arc::new(HostDirectives::permissive());
        }

        let Some(key) = robots_authority(url) else {
            return Arc::new(HostDirectives::permissive());
        };

        let cached = self.entries.lock().get(&key);
        if let Some(directives) = cached {
            return directives;
        }

        let slot = RefetchSlot::join(&self.refetch_locks, &key);
        let _guard = slot.lock.lock().await;

        // Another task may have fetched while we waited
        let cached = self.entries.lock().get(&key);
        if let Some(directives) = cached {
            return directives;
        }

        let entry = match robots_url(url) {
            Some(target) => self.fetch_directives(&key, target).await,
            None => self.fallback_entry(),
        };
        let directives = entry.directives.clone();

        let evicted = self.entries.lock().insert(key, entry);
        if let Some(evicted) = evicted {
            tracing::debug!("Evicted robots.txt entry for {}", evicted);
        }

        directives
    }

    /// Drops the cached directives for a host (`host` or `host:port`)
    pub fn invalidate(&self, authority: &str) -> bool {
        self.entries.lock().remove(authority)
    }

    /// Number of hosts with cached directives
    pub fn cached_hosts(&self) -> usize {
        self.entries.lock().len()
    }

    /// Fetches robots.txt, following up to `max_redirects` redirect hops
    async fn fetch_directives(&self, key: &str, start: Url) -> CachedDirectives {
        let Ok(_permit) = self.fetch_permits.acquire().await else {
            return self.fallback_entry();
        };

        let mut target = start;
        let mut hops = 0;

        loop {
            tracing::debug!("Fetching {}", target);

            match self.fetcher.fetch(&target).await {
                RobotsFetchOutcome::Success { body, .. } => {
                    let directives = HostDirectives::parse(&body, &self.config.user_agent);
                    tracing::info!(
                        "Loaded robots.txt for {} ({} rules, crawl delay {:?})",
                        key,
                        directives.rules().len(),
                        directives.crawl_delay()
                    );
                    return CachedDirectives::new(directives, self.ttl());
                }
                RobotsFetchOutcome::Redirect(location) => {
                    if hops >= self.config.max_redirects {
                        tracing::warn!(
                            "robots.txt for {} exceeded {} redirects",
                            key,
                            self.config.max_redirects
                        );
                        return self.fallback_entry();
                    }
                    match target.join(&location) {
                        Ok(next) => {
                            hops += 1;
                            target = next;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "robots.txt for {} redirected to invalid location '{}': {}",
                                key,
                                location,
                                e
                            );
                            return self.fallback_entry();
                        }
                    }
                }
                RobotsFetchOutcome::ClientError(status) => {
                    // A definitive "no robots.txt here" keeps the full TTL
                    tracing::debug!("No robots.txt for {} (status {})", key, status);
                    return CachedDirectives::new(HostDirectives::permissive(), self.ttl());
                }
                RobotsFetchOutcome::ServerError(status) => {
                    tracing::warn!("robots.txt for {} failed with status {}", key, status);
                    return self.fallback_entry();
                }
                RobotsFetchOutcome::TooLarge(size) => {
                    tracing::warn!(
                        "robots.txt for {} is too large ({} bytes > {})",
                        key,
                        size,
                        self.config.max_bytes
                    );
                    return self.fallback_entry();
                }
                RobotsFetchOutcome::UnsupportedContentType(content_type) => {
                    tracing::warn!(
                        "Can't read robots.txt for {}: content type {}",
                        key,
                        content_type
                    );
                    return self.fallback_entry();
                }
                RobotsFetchOutcome::Network(message) => {
                    tracing::warn!("robots.txt fetch for {} failed: {}", key, message);
                    return self.fallback_entry();
                }
            }
        }
    }

    fn ttl(&self) -> Duration {
        Duration::hours(self.config.ttl_hours as i64)
    }

    fn fallback_entry(&self) -> CachedDirectives {
        CachedDirectives::new(
            HostDirectives::permissive(),
            Duration::minutes(self.config.failed_fetch_ttl_minutes as i64),
        )
    }
}

/// A lookup's share of the per-host refetch lock
///
/// The map entry is removed when the last lookup holding it finishes or is
/// cancelled.
struct RefetchSlot<'a> {
    locks: &'a RefetchLocks,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> RefetchSlot<'a> {
    fn join(locks: &'a RefetchLocks, key: &str) -> Self {
        let lock = locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();

        Self {
            locks,
            key: key.to_string(),
            lock,
        }
    }
}

impl Drop for RefetchSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // Only the map and this slot still hold the lock
        let last = locks
            .get(&self.key)
            .is_some_and(|held| Arc::ptr_eq(held, &self.lock) && Arc::strong_count(held) == 2);
        if last {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Serves canned outcomes keyed by URL and counts requests
    struct ScriptedFetcher {
        outcomes: HashMap<String, RobotsFetchOutcome>,
        calls: AtomicUsize,
        delay: std::time::Duration,
    }

    impl ScriptedFetcher {
        fn new(outcomes: Vec<(&str, RobotsFetchOutcome)>) -> Self {
            Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: AtomicUsize::new(0),
                delay: std::time::Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl RobotsFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &Url) -> RobotsFetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcomes
                .get(url.as_str())
                .cloned()
                .unwrap_or(RobotsFetchOutcome::ClientError(404))
        }
    }

    fn create_test_config() -> RobotsConfig {
        RobotsConfig {
            user_agent: "TestBot/1.0".to_string(),
            timeout_ms: 200,
            cache_size: 2,
            ..RobotsConfig::default()
        }
    }

    fn text(body: &str) -> RobotsFetchOutcome {
        RobotsFetchOutcome::Success {
            body: body.to_string(),
            content_type: Some("text/plain".to_string()),
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_disallow_and_crawl_delay() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(
            "https://a.example/robots.txt",
            text("User-agent: *\nDisallow: /private\nCrawl-delay: 5"),
        )]));
        let cache = RobotsCache::new(create_test_config(), 2.0, fetcher.clone());

        assert!(!cache.allows(&url("https://a.example/private/x")).await);
        assert!(cache.allows(&url("https://a.example/public")).await);
        assert_eq!(cache.crawl_delay(&url("https://a.example/")).await, Some(5.0));

        // All lookups served by one fetch
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_crawl_delay_when_undeclared() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(
            "https://a.example/robots.txt",
            text("User-agent: *\nDisallow: /private"),
        )]));
        let cache = RobotsCache::new(create_test_config(), 2.0, fetcher);

        let target = url("https://a.example/page");
        assert_eq!(cache.crawl_delay(&target).await, None);
        assert_eq!(cache.effective_crawl_delay(&target).await, 2.0);
    }

    #[tokio::test]
    async fn test_redirects_followed_and_resolved() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            (
                "http://a.example/robots.txt",
                RobotsFetchOutcome::Redirect("https://a.example/robots.txt".to_string()),
            ),
            (
                "https://a.example/robots.txt",
                RobotsFetchOutcome::Redirect("/real-robots.txt".to_string()),
            ),
            (
                "https://a.example/real-robots.txt",
                text("User-agent: *\nDisallow: /"),
            ),
        ]));
        let cache = RobotsCache::new(create_test_config(), 2.0, fetcher.clone());

        assert!(!cache.allows(&url("http://a.example/page")).await);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cross_host_redirect_cached_under_original_host() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            (
                "https://a.example/robots.txt",
                RobotsFetchOutcome::Redirect("https://cdn.example/robots.txt".to_string()),
            ),
            (
                "https://cdn.example/robots.txt",
                text("User-agent: *\nDisallow: /private\nCrawl-delay: 3"),
            ),
        ]));
        let cache = RobotsCache::new(create_test_config(), 2.0, fetcher.clone());

        assert!(!cache.allows(&url("https://a.example/private/x")).await);
        assert!(cache.allows(&url("https://a.example/public")).await);
        assert_eq!(cache.crawl_delay(&url("https://a.example/")).await, Some(3.0));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        assert_eq!(cache.cached_hosts(), 1);
        assert!(!cache.invalidate("cdn.example"));
        assert!(cache.invalidate("a.example"));
    }

    #[tokio::test]
    async fn test_redirect_limit_falls_back_to_permissive() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            ("https://a.example/robots.txt", RobotsFetchOutcome::Redirect("/r1".into())),
            ("https://a.example/r1", RobotsFetchOutcome::Redirect("/r2".into())),
            ("https://a.example/r2", RobotsFetchOutcome::Redirect("/r3".into())),
            ("https://a.example/r3", RobotsFetchOutcome::Redirect("/r4".into())),
            ("https://a.example/r4", text("User-agent: *\nDisallow: /")),
        ]));
        let cache = RobotsCache::new(create_test_config(), 2.0, fetcher.clone());

        assert!(cache.allows(&url("https://a.example/page")).await);
        // Initial request plus three redirect hops
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failures_are_permissive() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            ("https://big.example/robots.txt", RobotsFetchOutcome::TooLarge(1 << 20)),
            ("https://down.example/robots.txt", RobotsFetchOutcome::ServerError(503)),
            (
                "https://img.example/robots.txt",
                RobotsFetchOutcome::UnsupportedContentType("image/png".into()),
            ),
            (
                "https://slow.example/robots.txt",
                RobotsFetchOutcome::Network("Request timeout".into()),
            ),
        ]));
        let cache = RobotsCache::new(
            RobotsConfig {
                cache_size: 10,
                ..create_test_config()
            },
            2.0,
            fetcher,
        );

        for host in ["big", "down", "img", "slow", "missing"] {
            let target = url(&format!("https://{}.example/anything", host));
            assert!(cache.allows(&target).await, "{} should be allowed", host);
            assert_eq!(cache.effective_crawl_delay(&target).await, 2.0);
        }
        assert_eq!(cache.cached_hosts(), 5);
    }

    #[tokio::test]
    async fn test_lru_eviction_and_invalidate() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let cache = RobotsCache::new(create_test_config(), 2.0, fetcher.clone());

        cache.allows(&url("https://a.example/")).await;
        cache.allows(&url("https://b.example/")).await;
        cache.allows(&url("https://a.example/")).await;
        cache.allows(&url("https://c.example/")).await;
        assert_eq!(cache.cached_hosts(), 2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);

        // "a" was accessed more recently than "b", so "b" was evicted
        cache.allows(&url("https://a.example/")).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        cache.allows(&url("https://b.example/")).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);

        assert!(cache.invalidate("b.example"));
        assert!(!cache.invalidate("b.example"));
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let mut scripted = ScriptedFetcher::new(vec![(
            "https://a.example/robots.txt",
            text("User-agent: *\nDisallow: /x"),
        )]);
        scripted.delay = std::time::Duration::from_millis(50);
        let fetcher = Arc::new(scripted);
        let cache = Arc::new(RobotsCache::new(create_test_config(), 2.0, fetcher.clone()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.allows(&url("https://a.example/x/1")).await
            }));
        }
        for handle in handles {
            assert!(!handle.await.unwrap());
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetch_lock_released() {
        let mut scripted = ScriptedFetcher::new(vec![]);
        scripted.delay = std::time::Duration::from_millis(200);
        let cache = RobotsCache::new(create_test_config(), 2.0, Arc::new(scripted));

        // Lookup cancelled mid-fetch
        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            cache.directives_for(&url("https://a.example/")),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(cache.refetch_locks.lock().is_empty());
        assert_eq!(cache.cached_hosts(), 0);

        // Completed lookup
        cache.directives_for(&url("https://b.example/")).await;
        assert!(cache.refetch_locks.lock().is_empty());
        assert_eq!(cache.cached_hosts(), 1);
    }

    #[tokio::test]
    async fn test_disabled_never_fetches() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(
            "https://a.example/robots.txt",
            text("User-agent: *\nDisallow: /"),
        )]));
        let config = RobotsConfig {
            enabled: false,
            ..create_test_config()
        };
        let cache = RobotsCache::new(config, 2.0, fetcher.clone());

        assert!(cache.allows(&url("https://a.example/x")).await);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_http_timeout_defaults_to_allow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /\nCrawl-delay: 9")
                    .set_delay(std::time::Duration::from_millis(1_000)),
            )
            .mount(&server)
            .await;

        let cache = RobotsCache::from_config(&create_test_config(), 2.0).unwrap();
        let target = url(&format!("{}/page", server.uri()));

        assert!(cache.allows(&target).await);
        assert_eq!(cache.crawl_delay(&target).await, None);
        assert_eq!(cache.effective_crawl_delay(&target).await, 2.0);
    }

    #[tokio::test]
    async fn test_http_disallow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: TestBot\nDisallow: /admin\nCrawl-delay: 1.5"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::from_config(&create_test_config(), 2.0).unwrap();

        assert!(!cache.allows(&url(&format!("{}/admin/users", server.uri()))).await);
        assert!(cache.allows(&url(&format!("{}/index.html", server.uri()))).await);
        assert_eq!(
            cache.crawl_delay(&url(&format!("{}/", server.uri()))).await,
            Some(1.5)
        );
    }
}
