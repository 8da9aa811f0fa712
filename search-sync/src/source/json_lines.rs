//! JSON-lines source store.
//!
//! Each entity type lives in `{dir}/{entity}.jsonl`, one JSON object per line.
//! Files are scanned on every call so only the requested records or one page
//! are ever held in memory.

use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use search_sync_shared::Record;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use super::SourceStore;
use crate::errors::SourceError;

/// Reads records from a directory of `.jsonl` files.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    dir: PathBuf,
}

impl JsonLinesSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", entity))
    }

    /// Open the entity's file. A missing file is an empty table.
    async fn open<'a>(&self, entity: &'a str) -> Result<Option<TableReader<'a>>, SourceError> {
        let path = self.path_for(entity);
        match File::open(&path).await {
            Ok(file) => Ok(Some(TableReader {
                entity,
                path,
                lines: BufReader::new(file).lines(),
                line_number: 0,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Source file missing, treating as empty");
                Ok(None)
            }
            Err(source) => Err(SourceError::Io { path, source }),
        }
    }
}

/// Sequential reader over one entity file.
struct TableReader<'a> {
    entity: &'a str,
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl TableReader<'_> {
    /// Read the next record, skipping blank lines.
    async fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&line)
                .map_err(|e| SourceError::parse(self.entity, self.line_number, e.to_string()))?;
            let record = Record::from_json(value).ok_or_else(|| {
                SourceError::parse(self.entity, self.line_number, "expected an object with an id")
            })?;
            return Ok(Some(record));
        }
    }
}

#[async_trait]
impl SourceStore for JsonLinesSource {
    /// A record id repeated in the file resolves to its last line.
    async fn fetch_by_ids(
        &self,
        entity: &str,
        ids: &[String],
    ) -> Result<Vec<Record>, SourceError> {
        let Some(mut table) = self.open(entity).await? else {
            return Ok(Vec::new());
        };
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let mut found: BTreeMap<String, Record> = BTreeMap::new();
        while let Some(record) = table.next_record().await? {
            if wanted.contains(record.id.as_str()) {
                found.insert(record.id.clone(), record);
            }
        }
        Ok(found.into_values().collect())
    }

    async fn fetch_page(
        &self,
        entity: &str,
        after_id: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<Record>, SourceError> {
        let Some(mut table) = self.open(entity).await? else {
            return Ok(Vec::new());
        };

        // Keep the `page_size` smallest ids above the cursor.
        let mut page: BTreeMap<String, Record> = BTreeMap::new();
        while let Some(record) = table.next_record().await? {
            if after_id.is_some_and(|after| record.id.as_str() <= after) {
                continue;
            }
            page.insert(record.id.clone(), record);
            if page.len() > page_size {
                page.pop_last();
            }
        }
        Ok(page.into_values().collect())
    }

    async fn fetch_referencing_ids(
        &self,
        entity: &str,
        field: &str,
        related_id: &str,
    ) -> Result<Vec<String>, SourceError> {
        let Some(mut table) = self.open(entity).await? else {
            return Ok(Vec::new());
        };

        // Later lines replace earlier ones with the same id.
        let mut latest: BTreeMap<String, bool> = BTreeMap::new();
        while let Some(record) = table.next_record().await? {
            let references = record.references(field, related_id);
            latest.insert(record.id, references);
        }
        Ok(latest
            .into_iter()
            .filter_map(|(id, references)| references.then_some(id))
            .collect())
    }
}
