//! In-memory registry used by tests and dry runs

use crate::registry::traits::{DomainRegistry, RegistryError, RegistryResult};
use crate::registry::Domain;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Registry backed by a map, keyed by host
#[derive(Debug, Default)]
pub struct InMemoryDomainRegistry {
    domains: RwLock<BTreeMap<String, Domain>>,
}

impl InMemoryDomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the given domains
    pub fn with_domains(domains: impl IntoIterator<Item = Domain>) -> Self {
        let map = domains
            .into_iter()
            .map(|d| (d.host.clone(), d))
            .collect();
        Self {
            domains: RwLock::new(map),
        }
    }
}

impl DomainRegistry for InMemoryDomainRegistry {
    fn find_by_host(&self, host: &str) -> RegistryResult<Option<Domain>> {
        Ok(self.domains.read().get(host).cloned())
    }

    fn find_active(&self) -> RegistryResult<Vec<Domain>> {
        Ok(self
            .domains
            .read()
            .values()
            .filter(|d| d.active)
            .cloned()
            .collect())
    }

    fn list_all(&self) -> RegistryResult<Vec<Domain>> {
        Ok(self.domains.read().values().cloned().collect())
    }

    fn upsert(&self, domain: &Domain) -> RegistryResult<()> {
        self.domains
            .write()
            .insert(domain.host.clone(), domain.clone());
        Ok(())
    }

    fn update_last_crawled(&self, host: &str, at: DateTime<Utc>) -> RegistryResult<()> {
        let mut domains = self.domains.write();
        let domain = domains
            .get_mut(host)
            .ok_or_else(|| RegistryError::NotFound(host.to_string()))?;
        domain.last_crawled = Some(at);
        Ok(())
    }

    fn update_seed_urls(&self, host: &str, seeds: &[String]) -> RegistryResult<()> {
        let mut domains = self.domains.write();
        let domain = domains
            .get_mut(host)
            .ok_or_else(|| RegistryError::NotFound(host.to_string()))?;
        domain.seed_urls = seeds.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_domains() {
        let registry = InMemoryDomainRegistry::with_domains(vec![
            Domain::new("a.example", 1),
            Domain::new("b.example", 2),
        ]);

        assert_eq!(registry.list_all().unwrap().len(), 2);
        assert_eq!(
            registry.find_by_host("b.example").unwrap().unwrap().priority,
            2
        );
    }

    #[test]
    fn test_update_last_crawled() {
        let registry = InMemoryDomainRegistry::with_domains(vec![Domain::new("a.example", 1)]);
        let now = Utc::now();

        registry.update_last_crawled("a.example", now).unwrap();

        let domain = registry.find_by_host("a.example").unwrap().unwrap();
        assert_eq!(domain.last_crawled, Some(now));
        assert!(registry.update_last_crawled("x.example", now).is_err());
    }
}
