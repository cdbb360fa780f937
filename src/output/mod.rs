//! Output module for persisting datasets and reporting runs
//!
//! This module handles:
//! - Writing the dataset atomically as CSV
//! - Loading a persisted dataset back into typed records
//! - Recording and printing run statistics

mod csv_output;
pub mod stats;
mod traits;

pub use csv_output::{read_dataset, write_dataset, CsvDatasetWriter};
pub use stats::{
    print_dataset_summary, print_statistics, summarize_dataset, DatasetSummary, RunStats,
};
pub use traits::{DatasetWriter, OutputError, OutputResult};
