//! Configuration module for the frontier service
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use frontier_service::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("frontier.toml")).unwrap();
//! println!("Back queues: {}", config.frontier.back_queue_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DomainEntry, FrontierConfig, RegistryConfig, RetryConfig, RetryPolicyKind,
    RobotsConfig, SchedulerConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
