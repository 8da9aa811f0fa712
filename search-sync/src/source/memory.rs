//! In-memory source store.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use search_sync_shared::Record;

use super::SourceStore;
use crate::errors::SourceError;

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<String, BTreeMap<String, Record>>,
    failing_pages: usize,
    failing_lookups: usize,
    page_calls: usize,
    lookup_calls: usize,
}

/// Records held in memory, keyed by entity type and id.
#[derive(Debug, Default)]
pub struct InMemorySource {
    tables: Mutex<Tables>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a record.
    pub fn insert(&self, entity: &str, record: Record) {
        self.tables()
            .records
            .entry(entity.to_string())
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Remove a record, returning whether it existed.
    pub fn remove(&self, entity: &str, id: &str) -> bool {
        self.tables()
            .records
            .get_mut(entity)
            .and_then(|table| table.remove(id))
            .is_some()
    }

    /// Make the next `count` page fetches fail.
    pub fn fail_next_pages(&self, count: usize) {
        self.tables().failing_pages = count;
    }

    /// Make the next `count` id lookups fail.
    pub fn fail_next_lookups(&self, count: usize) {
        self.tables().failing_lookups = count;
    }

    pub fn page_calls(&self) -> usize {
        self.tables().page_calls
    }

    pub fn lookup_calls(&self) -> usize {
        self.tables().lookup_calls
    }
}

#[async_trait]
impl SourceStore for InMemorySource {
    async fn fetch_by_ids(
        &self,
        entity: &str,
        ids: &[String],
    ) -> Result<Vec<Record>, SourceError> {
        let mut tables = self.tables();
        tables.lookup_calls += 1;
        if tables.failing_lookups > 0 {
            tables.failing_lookups -= 1;
            return Err(SourceError::unavailable("injected lookup failure"));
        }

        let Some(table) = tables.records.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| table.get(id).cloned()).collect())
    }

    async fn fetch_page(
        &self,
        entity: &str,
        after_id: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<Record>, SourceError> {
        let mut tables = self.tables();
        tables.page_calls += 1;
        if tables.failing_pages > 0 {
            tables.failing_pages -= 1;
            return Err(SourceError::unavailable("injected page failure"));
        }

        let Some(table) = tables.records.get(entity) else {
            return Ok(Vec::new());
        };
        let lower = match after_id {
            Some(id) => Bound::Excluded(id.to_string()),
            None => Bound::Unbounded,
        };
        Ok(table
            .range((lower, Bound::Unbounded))
            .take(page_size)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn fetch_referencing_ids(
        &self,
        entity: &str,
        field: &str,
        related_id: &str,
    ) -> Result<Vec<String>, SourceError> {
        let tables = self.tables();
        let Some(table) = tables.records.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(table
            .values()
            .filter(|record| record.references(field, related_id))
            .map(|record| record.id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_sync_shared::RelatedObject;

    #[tokio::test]
    async fn test_fetch_by_ids_skips_missing() {
        let source = InMemorySource::new();
        source.insert("contact", Record::new("1"));
        source.insert("contact", Record::new("3"));

        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let records = source.fetch_by_ids("contact", &ids).await.unwrap();

        let found: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(found, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_fetch_page_is_keyset() {
        let source = InMemorySource::new();
        for id in ["a", "b", "c"] {
            source.insert("contact", Record::new(id));
        }

        let page = source.fetch_page("contact", Some("a"), 10).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_fetch_referencing_ids() {
        let source = InMemorySource::new();
        let acme = RelatedObject::new("co1", Some("Acme"));
        source.insert("contact", Record::new("2").with("company", acme.clone()));
        source.insert("contact", Record::new("1").with("company", acme));
        source.insert(
            "contact",
            Record::new("3").with("company", RelatedObject::new("co2", None)),
        );

        let ids = source
            .fetch_referencing_ids("contact", "company", "co1")
            .await
            .unwrap();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(source
            .fetch_referencing_ids("company", "sector", "co1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let source = InMemorySource::new();
        source.insert("contact", Record::new("1"));
        assert!(source.remove("contact", "1"));
        assert!(!source.remove("contact", "1"));
    }
}
