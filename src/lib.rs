//! Frontier service: the URL frontier of a distributed web crawler
//!
//! This crate decides which URL should be fetched next. Incoming URLs are
//! admitted against a domain registry and cached robots.txt directives,
//! parked in priority-tiered front queues, drained by a weighted round-robin
//! scheduler into per-host back queues, and handed out one at a time to
//! whatever issues fetch tasks downstream.

pub mod config;
pub mod frontier;
pub mod registry;
pub mod robots;
pub mod stats;
pub mod url;

use thiserror::Error;

/// Main error type for frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] registry::RegistryError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unknown domain: {0}")]
    UnknownDomain(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain host: {0}")]
    InvalidHost(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Empty URL")]
    Empty,

    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for frontier operations
pub type Result<T> = std::result::Result<T, FrontierError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use frontier::{Admitted, Frontier, RejectReason, Rejection};
pub use registry::{Domain, DomainRegistry};
pub use url::{extract_host, parse_crawl_url};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_converts() {
        let err: FrontierError = registry::RegistryError::NotFound("a.example".to_string()).into();
        assert!(matches!(err, FrontierError::Registry(_)));
        assert_eq!(err.to_string(), "Registry error: Domain not found: a.example");
    }
}
