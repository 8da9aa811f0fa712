//! Source-record collaborators.
//!
//! The engine reads records through the `SourceStore` trait: lookups by id for
//! targeted syncs, keyset pages ordered by id for full-table syncs, and
//! reverse lookups of the records referencing a related record.

mod json_lines;
mod memory;
mod retry;

pub use json_lines::JsonLinesSource;
pub use memory::InMemorySource;
pub use retry::{RetryingSource, SourceRetryConfig};

use async_trait::async_trait;
use futures::stream::{self, Stream};
use search_sync_shared::Record;

use crate::errors::SourceError;

/// Read access to the system-of-record.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch the records with the given ids. Ids with no record are simply absent
    /// from the result; order is not significant.
    async fn fetch_by_ids(
        &self,
        entity: &str,
        ids: &[String],
    ) -> Result<Vec<Record>, SourceError>;

    /// Fetch up to `page_size` records with ids strictly greater than `after_id`,
    /// in ascending id order.
    async fn fetch_page(
        &self,
        entity: &str,
        after_id: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<Record>, SourceError>;

    /// Ids of the `entity` records whose `field` relation points at `related_id`,
    /// in ascending order.
    async fn fetch_referencing_ids(
        &self,
        entity: &str,
        field: &str,
        related_id: &str,
    ) -> Result<Vec<String>, SourceError>;
}

/// Stream the whole table of an entity type one page at a time.
///
/// Only one page is held in memory at once. The stream ends after the first
/// short or empty page.
pub fn stream_pages<'a>(
    source: &'a dyn SourceStore,
    entity: &'a str,
    page_size: usize,
) -> impl Stream<Item = Result<Vec<Record>, SourceError>> + Send + 'a {
    let page_size = page_size.max(1);
    stream::try_unfold(Some(None::<String>), move |cursor| async move {
        let Some(after_id) = cursor else {
            return Ok(None);
        };
        let page = source
            .fetch_page(entity, after_id.as_deref(), page_size)
            .await?;
        if page.is_empty() {
            return Ok(None);
        }
        let next = if page.len() < page_size {
            None
        } else {
            page.last().map(|record| Some(record.id.clone()))
        };
        Ok(Some((page, next)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_stream_pages_walks_whole_table() {
        let source = InMemorySource::new();
        for id in ["a", "b", "c", "d", "e"] {
            source.insert("company", Record::new(id));
        }

        let pages: Vec<Vec<Record>> = stream_pages(&source, "company", 2)
            .try_collect()
            .await
            .unwrap();

        let sizes: Vec<usize> = pages.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let ids: Vec<&str> = pages.iter().flatten().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_stream_pages_exact_multiple_ends_on_empty_page() {
        let source = InMemorySource::new();
        for id in ["a", "b", "c", "d"] {
            source.insert("company", Record::new(id));
        }

        let pages: Vec<Vec<Record>> = stream_pages(&source, "company", 2)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(source.page_calls(), 3);
    }

    #[tokio::test]
    async fn test_stream_pages_empty_table() {
        let source = InMemorySource::new();
        let pages: Vec<Vec<Record>> = stream_pages(&source, "company", 10)
            .try_collect()
            .await
            .unwrap();
        assert!(pages.is_empty());
    }
}
