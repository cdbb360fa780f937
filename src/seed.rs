//! Seed file handling
//!
//! A seed file is a CSV table with a header row and two columns, the detail
//! page URL and an externally assigned index. It is used either to carry a
//! previous crawl's indices over to freshly discovered entries, or as the
//! entry source itself when the catalog is not paginated.

use crate::model::ListingEntry;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors raised while reading a seed file
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid seed row at line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

/// URL to index correlation table, in file order
#[derive(Debug, Clone, Default)]
pub struct SeedTable {
    entries: Vec<ListingEntry>,
    by_url: HashMap<String, u64>,
}

impl SeedTable {
    /// Reads a seed table from a CSV file
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        Self::from_reader(reader)
    }

    /// Parses a seed table from in-memory CSV text
    pub fn parse(content: &str) -> Result<Self, SeedError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, SeedError> {
        let mut table = SeedTable::default();

        for row in reader.records() {
            let row = row?;
            if row.iter().all(str::is_empty) {
                continue;
            }

            let line = row.position().map(|p| p.line()).unwrap_or_default();
            let (raw_url, raw_index) = match (row.get(0), row.get(1)) {
                (Some(url), Some(index)) if !url.is_empty() && !index.is_empty() => (url, index),
                _ => {
                    return Err(SeedError::InvalidRow {
                        line,
                        message: "expected a url and an index".to_string(),
                    })
                }
            };

            let url = Url::parse(raw_url).map_err(|e| SeedError::InvalidRow {
                line,
                message: format!("invalid url '{}': {}", raw_url, e),
            })?;
            let index = raw_index.parse::<u64>().map_err(|_| SeedError::InvalidRow {
                line,
                message: format!("index '{}' is not a non-negative integer", raw_index),
            })?;

            table.insert(url, index);
        }

        Ok(table)
    }

    fn insert(&mut self, url: Url, index: u64) {
        if self.by_url.contains_key(url.as_str()) {
            tracing::debug!("Ignoring repeated seed row for {}", url);
            return;
        }
        self.by_url.insert(url.to_string(), index);
        self.entries.push(ListingEntry::with_index(url, index));
    }

    /// Looks up the index assigned to a detail URL
    pub fn index_for(&self, url: &Url) -> Option<u64> {
        self.by_url.get(url.as_str()).copied()
    }

    /// Entries in file order, one per distinct URL
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
