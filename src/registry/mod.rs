//! Domain registry access
//!
//! This module handles everything the frontier knows about hosts:
//! - The `Domain` record (priority, active flag, last crawl time, seeds)
//! - Registry backends (SQLite and in-memory)
//! - A read-through cache consulted on every admission
//! - Bootstrapping configured domains into the registry at startup

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::InMemoryDomainRegistry;
pub use sqlite::SqliteDomainRegistry;
pub use traits::{DomainRegistry, RegistryError, RegistryResult};

use crate::config::DomainEntry;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Opens or creates the SQLite registry at the given path
pub fn open_registry(path: &Path) -> RegistryResult<SqliteDomainRegistry> {
    SqliteDomainRegistry::new(path)
}

/// A host the frontier is allowed to crawl
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    /// Lowercase host name, unique
    pub host: String,

    /// Base priority tier used for front-queue keys
    pub priority: u32,

    /// Inactive domains keep their queued URLs but get no seed scheduling
    pub active: bool,

    /// When another service last fetched from this host
    pub last_crawled: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    /// Ordered entry points for seed scheduling
    pub seed_urls: Vec<String>,
}

impl Domain {
    /// Creates an active, never-crawled domain seeded with `https://<host>`
    pub fn new(host: impl Into<String>, priority: u32) -> Self {
        let host = host.into();
        let seed = format!("https://{}", host);
        Self {
            host,
            priority,
            active: true,
            last_crawled: None,
            created_at: Utc::now(),
            seed_urls: vec![seed],
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<String>) -> Self {
        self.seed_urls = seeds;
        self
    }

    pub fn with_last_crawled(mut self, at: DateTime<Utc>) -> Self {
        self.last_crawled = Some(at);
        self
    }
}

impl From<&DomainEntry> for Domain {
    fn from(entry: &DomainEntry) -> Self {
        let mut domain =
            Domain::new(entry.host.clone(), entry.priority).with_seeds(entry.seed_urls());
        domain.active = entry.active;
        domain
    }
}

/// Read-through cache over a `DomainRegistry`
///
/// Hits are memoized for the lifetime of the process (or until
/// `invalidate`); misses are not, so a host added to the registry becomes
/// visible on its next occurrence.
pub struct DomainCache {
    registry: Arc<dyn DomainRegistry>,
    entries: RwLock<HashMap<String, Domain>>,
}

impl DomainCache {
    pub fn new(registry: Arc<dyn DomainRegistry>) -> Self {
        Self {
            registry,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the domain for a host, querying the registry on a miss
    ///
    /// # Arguments
    ///
    /// * `host` - Lowercase host name
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Domain))` - Known host (cached or freshly loaded)
    /// * `Ok(None)` - Host not in the registry
    /// * `Err(RegistryError)` - Registry could not be queried
    pub fn get_domain(&self, host: &str) -> RegistryResult<Option<Domain>> {
        if let Some(domain) = self.entries.read().get(host) {
            return Ok(Some(domain.clone()));
        }

        let found = self.registry.find_by_host(host)?;
        if let Some(domain) = &found {
            tracing::debug!("Cached registry entry for {}", host);
            self.entries
                .write()
                .insert(host.to_string(), domain.clone());
        }
        Ok(found)
    }

    /// Drops the cached entry for a host so the next lookup hits the registry
    pub fn invalidate(&self, host: &str) -> bool {
        self.entries.write().remove(host).is_some()
    }

    /// Number of cached hosts
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The backing registry
    pub fn registry(&self) -> &Arc<dyn DomainRegistry> {
        &self.registry
    }
}

/// Inserts configured domains that the registry does not know yet
///
/// Existing rows are never overwritten; priorities and seeds changed by
/// other services win over the configuration file.
///
/// # Returns
///
/// The number of domains inserted
pub fn sync_configured_domains(
    registry: &dyn DomainRegistry,
    entries: &[DomainEntry],
) -> RegistryResult<usize> {
    let mut inserted = 0;

    for entry in entries {
        if registry.find_by_host(&entry.host)?.is_some() {
            tracing::debug!("Domain {} already registered", entry.host);
            continue;
        }

        registry.upsert(&Domain::from(entry))?;
        tracing::info!(
            "Registered domain {} (priority {})",
            entry.host,
            entry.priority
        );
        inserted += 1;
    }

    Ok(inserted)
}
