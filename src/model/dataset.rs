use crate::model::BookRecord;
use crate::output::{read_dataset, OutputResult};
use std::collections::HashSet;
use std::path::Path;

/// The ordered result of one pipeline run
///
/// Produced once at the end of a run and never mutated afterwards; the
/// query layer receives it by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: Vec<BookRecord>,
}

impl Dataset {
    /// Wraps records that are already in discovery order
    pub fn new(records: Vec<BookRecord>) -> Self {
        Self { records }
    }

    /// Reads a persisted dataset, validating every row once
    pub fn load(path: &Path) -> OutputResult<Self> {
        read_dataset(path)
    }

    pub fn records(&self) -> &[BookRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BookRecord> {
        self.records.iter()
    }

    /// Returns true when no two records share a `Link`
    pub fn has_unique_links(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.records.len());
        self.records.iter().all(|record| seen.insert(record.link()))
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a BookRecord;
    type IntoIter = std::slice::Iter<'a, BookRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
