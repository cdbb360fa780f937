//! Run statistics
//!
//! Counters maintained by the coordinator during a run, and the end-of-run
//! report printed from them.

use crate::crawler::{ExhaustReason, SkipReason};
use crate::model::Dataset;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Counters for one pipeline run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Listing pages requested (including the final empty or missing one)
    pub pages_visited: u32,

    /// Entries handed to the extractor
    pub items_discovered: u64,

    /// Records accepted into the dataset
    pub items_accepted: u64,

    /// Entries skipped because the detail page could not be fetched
    pub skipped_fetch: u64,

    /// Entries skipped because the detail page was missing required data
    pub skipped_malformed: u64,

    /// Records dropped because their link was already accepted
    pub duplicates_dropped: u64,

    /// Why pagination stopped (None for seed-driven runs)
    pub end_reason: Option<ExhaustReason>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            pages_visited: 0,
            items_discovered: 0,
            items_accepted: 0,
            skipped_fetch: 0,
            skipped_malformed: 0,
            duplicates_dropped: 0,
            end_reason: None,
        }
    }

    /// Total entries that produced no record
    pub fn items_skipped(&self) -> u64 {
        self.skipped_fetch + self.skipped_malformed
    }

    pub fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::FetchFailure(_) => self.skipped_fetch += 1,
            SkipReason::Malformed(_) => self.skipped_malformed += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration in seconds, once finished
    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Accepted records as a percentage of discovered entries
    pub fn acceptance_rate(&self) -> f64 {
        if self.items_discovered == 0 {
            return 0.0;
        }
        (self.items_accepted as f64 / self.items_discovered as f64) * 100.0
    }
}

/// Prints run statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStats) {
    println!("=== Scrape Statistics ===\n");

    println!("Overview:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    if let Some(duration) = stats.duration_seconds() {
        println!("  Duration: {:.1}s", duration);
    }
    println!("  Listing pages visited: {}", stats.pages_visited);
    if let Some(reason) = &stats.end_reason {
        println!("  Pagination ended: {}", reason);
    }
    println!();

    println!("Items:");
    println!("  Discovered: {}", stats.items_discovered);
    println!("  Accepted: {}", stats.items_accepted);
    println!(
        "  Skipped: {} (fetch failures: {}, malformed pages: {})",
        stats.items_skipped(),
        stats.skipped_fetch,
        stats.skipped_malformed
    );
    if stats.duplicates_dropped > 0 {
        println!("  Duplicate links dropped: {}", stats.duplicates_dropped);
    }
    println!();

    println!(
        "Acceptance Rate: {:.1}% ({} / {} items)",
        stats.acceptance_rate(),
        stats.items_accepted,
        stats.items_discovered
    );
}

/// Aggregate view of a persisted dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSummary {
    pub records: usize,
    pub total_stock: u64,
    pub by_category: BTreeMap<String, usize>,
    pub by_rating: BTreeMap<u8, usize>,
    pub missing_images: usize,
    pub missing_descriptions: usize,
}

/// Computes per-category and per-rating counts for a dataset
pub fn summarize_dataset(dataset: &Dataset) -> DatasetSummary {
    let mut summary = DatasetSummary {
        records: dataset.len(),
        ..DatasetSummary::default()
    };

    for record in dataset {
        summary.total_stock += u64::from(record.stock());
        *summary
            .by_category
            .entry(record.category().to_string())
            .or_default() += 1;
        *summary.by_rating.entry(record.rating()).or_default() += 1;
        if record.image() == crate::model::NOT_FOUND {
            summary.missing_images += 1;
        }
        if record.description() == crate::model::NOT_FOUND {
            summary.missing_descriptions += 1;
        }
    }

    summary
}

/// Prints a dataset summary to stdout
pub fn print_dataset_summary(summary: &DatasetSummary) {
    println!("=== Dataset Summary ===\n");
    println!("  Records: {}", summary.records);
    println!("  Units in stock: {}", summary.total_stock);
    println!("  Missing images: {}", summary.missing_images);
    println!("  Missing descriptions: {}", summary.missing_descriptions);
    println!();

    println!("By Rating:");
    for (rating, count) in &summary.by_rating {
        println!("  {}: {}", rating, count);
    }
    println!();

    println!("By Category ({}):", summary.by_category.len());
    let mut categories: Vec<_> = summary.by_category.iter().collect();
    categories.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (category, count) in categories {
        println!("  - {}: {}", category, count);
    }
}
