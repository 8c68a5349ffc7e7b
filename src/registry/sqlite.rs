//! SQLite registry implementation
//!
//! This module provides a SQLite-based implementation of the DomainRegistry trait.

use crate::registry::schema::initialize_schema;
use crate::registry::traits::{DomainRegistry, RegistryError, RegistryResult};
use crate::registry::Domain;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SELECT_COLUMNS: &str = "SELECT host, priority, active, last_crawled, created_at, seed_urls FROM domains";

/// SQLite registry backend
pub struct SqliteDomainRegistry {
    conn: Mutex<Connection>,
}

/// Raw column values before timestamp and seed decoding
struct DomainRow {
    host: String,
    priority: u32,
    active: bool,
    last_crawled: Option<String>,
    created_at: String,
    seed_urls: String,
}

impl SqliteDomainRegistry {
    /// Opens or creates a registry database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteDomainRegistry)` - Successfully opened/created database
    /// * `Err(RegistryError)` - Failed to open database
    pub fn new(path: &Path) -> RegistryResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory registry database
    pub fn new_in_memory() -> RegistryResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_many(&self, sql: &str) -> RegistryResult<Vec<Domain>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(decode_row).collect()
    }
}

impl DomainRegistry for SqliteDomainRegistry {
    fn find_by_host(&self, host: &str) -> RegistryResult<Option<Domain>> {
        let sql = format!("{} WHERE host = ?1", SELECT_COLUMNS);
        let row = self
            .conn
            .lock()
            .query_row(&sql, params![host], read_row)
            .optional()?;

        row.map(decode_row).transpose()
    }

    fn find_active(&self) -> RegistryResult<Vec<Domain>> {
        self.query_many(&format!("{} WHERE active = 1 ORDER BY host", SELECT_COLUMNS))
    }

    fn list_all(&self) -> RegistryResult<Vec<Domain>> {
        self.query_many(&format!("{} ORDER BY host", SELECT_COLUMNS))
    }

    fn upsert(&self, domain: &Domain) -> RegistryResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO domains
             (host, priority, active, last_crawled, created_at, seed_urls)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                domain.host,
                domain.priority,
                domain.active,
                domain.last_crawled.map(|t| t.to_rfc3339()),
                domain.created_at.to_rfc3339(),
                domain.seed_urls.join("\n"),
            ],
        )?;
        Ok(())
    }

    fn update_last_crawled(&self, host: &str, at: DateTime<Utc>) -> RegistryResult<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE domains SET last_crawled = ?1 WHERE host = ?2",
            params![at.to_rfc3339(), host],
        )?;

        if updated == 0 {
            return Err(RegistryError::NotFound(host.to_string()));
        }
        Ok(())
    }

    fn update_seed_urls(&self, host: &str, seeds: &[String]) -> RegistryResult<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE domains SET seed_urls = ?1 WHERE host = ?2",
            params![seeds.join("\n"), host],
        )?;

        if updated == 0 {
            return Err(RegistryError::NotFound(host.to_string()));
        }
        Ok(())
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<DomainRow> {
    Ok(DomainRow {
        host: row.get(0)?,
        priority: row.get(1)?,
        active: row.get(2)?,
        last_crawled: row.get(3)?,
        created_at: row.get(4)?,
        seed_urls: row.get(5)?,
    })
}

fn decode_row(row: DomainRow) -> RegistryResult<Domain> {
    let last_crawled = row.last_crawled.as_deref().map(parse_timestamp).transpose()?;
    let created_at = parse_timestamp(&row.created_at)?;
    let seed_urls = row
        .seed_urls
        .lines()
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    Ok(Domain {
        host: row.host,
        priority: row.priority,
        active: row.active,
        last_crawled,
        created_at,
        seed_urls,
    })
}

fn parse_timestamp(value: &str) -> RegistryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RegistryError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_in_memory() {
        let registry = SqliteDomainRegistry::new_in_memory();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_upsert_and_find() {
        let registry = SqliteDomainRegistry::new_in_memory().unwrap();
        let domain = Domain::new("example.com", 2)
            .with_seeds(vec!["https://example.com/a".into(), "https://example.com/b".into()]);

        registry.upsert(&domain).unwrap();

        let found = registry.find_by_host("example.com").unwrap().unwrap();
        assert_eq!(found.priority, 2);
        assert!(found.active);
        assert!(found.last_crawled.is_none());
        assert_eq!(found.seed_urls.len(), 2);
        assert_eq!(found.seed_urls[1], "https://example.com/b");
    }

    #[test]
    fn test_find_unknown_host() {
        let registry = SqliteDomainRegistry::new_in_memory().unwrap();
        assert!(registry.find_by_host("missing.example").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let registry = SqliteDomainRegistry::new_in_memory().unwrap();
        registry.upsert(&Domain::new("example.com", 1)).unwrap();
        registry.upsert(&Domain::new("example.com", 3)).unwrap();

        let all = registry.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].priority, 3);
    }

    #[test]
    fn test_find_active_filters_inactive() {
        let registry = SqliteDomainRegistry::new_in_memory().unwrap();
        registry.upsert(&Domain::new("b.example", 1)).unwrap();
        registry.upsert(&Domain::new("a.example", 1)).unwrap();

        let mut inactive = Domain::new("c.example", 1);
        inactive.active = false;
        registry.upsert(&inactive).unwrap();

        let hosts: Vec<String> = registry
            .find_active()
            .unwrap()
            .into_iter()
            .map(|d| d.host)
            .collect();
        assert_eq!(hosts, vec!["a.example", "b.example"]);
        assert_eq!(registry.list_all().unwrap().len(), 3);
    }

    #[test]
    fn test_update_last_crawled() {
        let registry = SqliteDomainRegistry::new_in_memory().unwrap();
        registry.upsert(&Domain::new("example.com", 1)).unwrap();

        let now = Utc::now();
        registry.update_last_crawled("example.com", now).unwrap();

        let found = registry.find_by_host("example.com").unwrap().unwrap();
        let stored = found.last_crawled.unwrap();
        assert_eq!(stored.timestamp(), now.timestamp());
    }

    #[test]
    fn test_update_unknown_host_is_not_found() {
        let registry = SqliteDomainRegistry::new_in_memory().unwrap();
        let result = registry.update_last_crawled("missing.example", Utc::now());
        assert!(matches!(result, Err(RegistryError::NotFound(_))));

        let result = registry.update_seed_urls("missing.example", &[]);
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_update_seed_urls() {
        let registry = SqliteDomainRegistry::new_in_memory().unwrap();
        registry.upsert(&Domain::new("example.com", 1)).unwrap();

        registry
            .update_seed_urls("example.com", &["https://example.com/sitemap".to_string()])
            .unwrap();

        let found = registry.find_by_host("example.com").unwrap().unwrap();
        assert_eq!(found.seed_urls, vec!["https://example.com/sitemap"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.db");

        {
            let registry = SqliteDomainRegistry::new(&path).unwrap();
            registry.upsert(&Domain::new("example.com", 2)).unwrap();
        }

        let registry = SqliteDomainRegistry::new(&path).unwrap();
        let found = registry.find_by_host("example.com").unwrap().unwrap();
        assert_eq!(found.priority, 2);
    }
}
