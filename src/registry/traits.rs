//! Registry traits and error types
//!
//! This module defines the trait interface for domain registry backends and
//! associated error types.

use crate::registry::Domain;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Domain not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Trait for domain registry backends
///
/// The registry is the allow-list of hosts the frontier is permitted to
/// crawl. Other services write `last_crawled` and seed URLs out of band; the
/// frontier itself only reads, apart from startup bootstrap.
///
/// Implementations must be safe to share across admission tasks.
pub trait DomainRegistry: Send + Sync {
    /// Looks up a domain by its host name
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Domain))` - The host is registered
    /// * `Ok(None)` - The host is unknown to the registry
    /// * `Err(RegistryError)` - The backend could not be queried
    fn find_by_host(&self, host: &str) -> RegistryResult<Option<Domain>>;

    /// Lists all domains marked active, ordered by host
    fn find_active(&self) -> RegistryResult<Vec<Domain>>;

    /// Lists every registered domain, ordered by host
    fn list_all(&self) -> RegistryResult<Vec<Domain>>;

    /// Inserts a domain or replaces the existing row for its host
    fn upsert(&self, domain: &Domain) -> RegistryResult<()>;

    /// Records when a domain was last crawled
    ///
    /// Returns `RegistryError::NotFound` if the host is not registered.
    fn update_last_crawled(&self, host: &str, at: DateTime<Utc>) -> RegistryResult<()>;

    /// Replaces the seed URLs of a domain
    ///
    /// Returns `RegistryError::NotFound` if the host is not registered.
    fn update_seed_urls(&self, host: &str, seeds: &[String]) -> RegistryResult<()>;
}
