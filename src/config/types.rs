use serde::Deserialize;

/// Main configuration structure for the frontier service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub registry: RegistryConfig,
    #[serde(default, rename = "domain")]
    pub domains: Vec<DomainEntry>,
}

/// Queue layout and capacity
#[derive(Debug, Clone, Deserialize)]
pub struct FrontierConfig {
    /// Maximum URLs held by a single front sub-queue
    #[serde(rename = "front-queue-capacity", default = "default_queue_capacity")]
    pub front_queue_capacity: usize,

    /// Number of back-queue buckets (`b0..bN-1`)
    #[serde(rename = "back-queue-count", default = "default_back_queue_count")]
    pub back_queue_count: usize,

    /// Maximum URLs held by a single back-queue bucket
    #[serde(rename = "back-queue-capacity", default = "default_queue_capacity")]
    pub back_queue_capacity: usize,

    /// Sub-buckets per priority tier
    #[serde(rename = "sub-buckets", default = "default_sub_buckets")]
    pub sub_buckets: u32,

    /// Lower-urgency tiers tried when a tier's sub-buckets are all full
    #[serde(rename = "fallback-tiers", default = "default_fallback_tiers")]
    pub fallback_tiers: usize,

    /// Repeating tier sequence the drain scheduler walks
    #[serde(rename = "weighted-schedule", default = "default_weighted_schedule")]
    pub weighted_schedule: Vec<u32>,

    /// Crawl delay (seconds) assumed when robots.txt does not declare one
    #[serde(rename = "default-crawl-delay", default = "default_crawl_delay")]
    pub default_crawl_delay: f64,
}

/// Robots.txt fetching and caching
#[derive(Debug, Clone, Deserialize)]
pub struct RobotsConfig {
    /// When false every URL is allowed and no crawl delay is reported
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// User agent sent with robots.txt requests and matched against groups
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of hosts kept in the directive cache
    #[serde(rename = "cache-size", default = "default_cache_size")]
    pub cache_size: usize,

    /// Lifetime of successfully fetched directives
    #[serde(rename = "ttl-hours", default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Lifetime of the permissive fallback stored after a failed fetch
    #[serde(
        rename = "failed-fetch-ttl-minutes",
        default = "default_failed_ttl_minutes"
    )]
    pub failed_fetch_ttl_minutes: u64,

    /// Bodies larger than this are treated as a fetch failure
    #[serde(rename = "max-bytes", default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Redirect hops followed before giving up
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Connect and read timeout for one robots.txt request
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Concurrent robots.txt fetches across all hosts
    #[serde(
        rename = "max-concurrent-fetches",
        default = "default_max_concurrent_fetches"
    )]
    pub max_concurrent_fetches: usize,
}

/// Periodic service loops
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(rename = "drain-interval-ms", default = "default_drain_interval")]
    pub drain_interval_ms: u64,

    /// URLs moved front -> back per drain cycle
    #[serde(rename = "drain-batch-size", default = "default_drain_batch")]
    pub drain_batch_size: usize,

    #[serde(rename = "dispatch-interval-ms", default = "default_dispatch_interval")]
    pub dispatch_interval_ms: u64,

    /// URLs emitted as fetch tasks per dispatch tick
    #[serde(rename = "dispatch-batch-size", default = "default_dispatch_batch")]
    pub dispatch_batch_size: usize,

    #[serde(rename = "retry-interval-ms", default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// URLs re-admitted from the retry set per sweep
    #[serde(rename = "retry-batch-size", default = "default_retry_batch")]
    pub retry_batch_size: usize,

    #[serde(rename = "stats-interval-ms", default = "default_stats_interval")]
    pub stats_interval_ms: u64,

    /// How often the seeds of active domains are re-admitted (0 disables)
    #[serde(rename = "seed-interval-ms", default = "default_seed_interval")]
    pub seed_interval_ms: u64,

    /// URLs of one batch admitted in parallel
    #[serde(
        rename = "admission-concurrency",
        default = "default_admission_concurrency"
    )]
    pub admission_concurrency: usize,
}

/// Which retry-eligibility rule is applied to failed fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicyKind {
    /// Retry below the ceiling once the cool-down has elapsed, drop beyond it
    Cooldown,
    /// Park every failure for the periodic sweep regardless of count or age
    Sweep,
}

/// Retry handling for downstream fetch failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_policy")]
    pub policy: RetryPolicyKind,

    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "cooldown-secs", default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

/// Domain registry backend
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Path to the SQLite registry database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Domain bootstrapped into the registry on startup
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Host name, e.g. "example.com"
    pub host: String,

    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Seed URLs; defaults to `https://<host>` when empty
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default = "default_true")]
    pub active: bool,
}

impl DomainEntry {
    /// Seed URLs with the `https://<host>` default applied
    pub fn seed_urls(&self) -> Vec<String> {
        if self.seeds.is_empty() {
            vec![format!("https://{}", self.host)]
        } else {
            self.seeds.clone()
        }
    }
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            front_queue_capacity: default_queue_capacity(),
            back_queue_count: default_back_queue_count(),
            back_queue_capacity: default_queue_capacity(),
            sub_buckets: default_sub_buckets(),
            fallback_tiers: default_fallback_tiers(),
            weighted_schedule: default_weighted_schedule(),
            default_crawl_delay: default_crawl_delay(),
        }
    }
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: default_user_agent(),
            cache_size: default_cache_size(),
            ttl_hours: default_ttl_hours(),
            failed_fetch_ttl_minutes: default_failed_ttl_minutes(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            timeout_ms: default_timeout_ms(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: default_drain_interval(),
            drain_batch_size: default_drain_batch(),
            dispatch_interval_ms: default_dispatch_interval(),
            dispatch_batch_size: default_dispatch_batch(),
            retry_interval_ms: default_retry_interval(),
            retry_batch_size: default_retry_batch(),
            stats_interval_ms: default_stats_interval(),
            seed_interval_ms: default_seed_interval(),
            admission_concurrency: default_admission_concurrency(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: default_retry_policy(),
            max_retries: default_max_retries(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_back_queue_count() -> usize {
    10
}

fn default_sub_buckets() -> u32 {
    3
}

fn default_fallback_tiers() -> usize {
    2
}

fn default_weighted_schedule() -> Vec<u32> {
    vec![3, 3, 3, 3, 3, 2, 2, 2, 1]
}

fn default_crawl_delay() -> f64 {
    2.0
}

fn default_user_agent() -> String {
    "FrontierBot/1.0".to_string()
}

fn default_cache_size() -> usize {
    500
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_failed_ttl_minutes() -> u64 {
    60
}

fn default_max_bytes() -> usize {
    500 * 1024
}

fn default_max_redirects() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_concurrent_fetches() -> usize {
    10
}

fn default_drain_interval() -> u64 {
    3_000
}

fn default_drain_batch() -> usize {
    50
}

fn default_dispatch_interval() -> u64 {
    2_000
}

fn default_dispatch_batch() -> usize {
    10
}

fn default_retry_interval() -> u64 {
    300_000
}

fn default_retry_batch() -> usize {
    5
}

fn default_stats_interval() -> u64 {
    30_000
}

fn default_seed_interval() -> u64 {
    30_000
}

fn default_admission_concurrency() -> usize {
    10
}

fn default_retry_policy() -> RetryPolicyKind {
    RetryPolicyKind::Cooldown
}

fn default_max_retries() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_priority() -> u32 {
    1
}
