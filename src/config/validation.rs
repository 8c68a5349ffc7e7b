use crate::config::types::{
    Config, DomainEntry, FrontierConfig, RegistryConfig, RobotsConfig, SchedulerConfig,
};
use crate::ConfigError;
use url::Url;

/// Largest tier whose queue keys (`tier * 10 + 9`) still fit in a u32
pub const MAX_SCHEDULE_TIER: u32 = (u32::MAX - 9) / 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_frontier_config(&config.frontier)?;
    validate_robots_config(&config.robots)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_registry_config(&config.registry)?;
    validate_domains(&config.domains)?;
    Ok(())
}

/// Validates queue layout
fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.front_queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "front_queue_capacity must be >= 1".to_string(),
        ));
    }

    if config.back_queue_count == 0 {
        return Err(ConfigError::Validation(
            "back_queue_count must be >= 1".to_string(),
        ));
    }

    if config.back_queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "back_queue_capacity must be >= 1".to_string(),
        ));
    }

    // Queue keys are priority * 10 + sub_bucket
    if config.sub_buckets == 0 || config.sub_buckets > 10 {
        return Err(ConfigError::Validation(format!(
            "sub_buckets must be between 1 and 10, got {}",
            config.sub_buckets
        )));
    }

    if config.weighted_schedule.is_empty() {
        return Err(ConfigError::Validation(
            "weighted_schedule cannot be empty".to_string(),
        ));
    }

    if let Some(tier) = config
        .weighted_schedule
        .iter()
        .find(|&&tier| tier > MAX_SCHEDULE_TIER)
    {
        return Err(ConfigError::Validation(format!(
            "weighted_schedule tier {} exceeds {}",
            tier, MAX_SCHEDULE_TIER
        )));
    }

    if !config.default_crawl_delay.is_finite() || config.default_crawl_delay < 0.0 {
        return Err(ConfigError::Validation(format!(
            "default_crawl_delay must be a non-negative number, got {}",
            config.default_crawl_delay
        )));
    }

    Ok(())
}

/// Validates robots.txt fetching limits
fn validate_robots_config(config: &RobotsConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.cache_size == 0 {
        return Err(ConfigError::Validation(
            "robots cache_size must be >= 1".to_string(),
        ));
    }

    if config.max_bytes == 0 {
        return Err(ConfigError::Validation(
            "robots max_bytes must be >= 1".to_string(),
        ));
    }

    if config.max_redirects > 10 {
        return Err(ConfigError::Validation(format!(
            "robots max_redirects must be <= 10, got {}",
            config.max_redirects
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "robots timeout_ms must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_fetches == 0 {
        return Err(ConfigError::Validation(
            "robots max_concurrent_fetches must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates service loop settings
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("drain_interval_ms", config.drain_interval_ms),
        ("dispatch_interval_ms", config.dispatch_interval_ms),
        ("retry_interval_ms", config.retry_interval_ms),
        ("stats_interval_ms", config.stats_interval_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be >= 1", name)));
        }
    }

    for (name, value) in [
        ("drain_batch_size", config.drain_batch_size),
        ("dispatch_batch_size", config.dispatch_batch_size),
        ("retry_batch_size", config.retry_batch_size),
        ("admission_concurrency", config.admission_concurrency),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be >= 1", name)));
        }
    }

    Ok(())
}

fn validate_registry_config(config: &RegistryConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates bootstrap domain entries
fn validate_domains(domains: &[DomainEntry]) -> Result<(), ConfigError> {
    for entry in domains {
        validate_host(&entry.host)?;

        for seed in &entry.seeds {
            let url = Url::parse(seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
            })?;

            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' must use HTTP or HTTPS",
                    seed
                )));
            }
        }
    }

    Ok(())
}

/// Validates a host name
fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::InvalidHost("Host cannot be empty".to_string()));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidHost(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidHost(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidHost(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    if host.chars().any(|c| c.is_uppercase()) {
        return Err(ConfigError::InvalidHost(format!(
            "Host '{}' must be lowercase",
            host
        )));
    }

    Ok(())
}
