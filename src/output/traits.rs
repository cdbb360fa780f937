//! Output traits and error types
//!
//! This module defines the interface the pipeline uses to persist a
//! finished dataset, and the errors persistence can raise.

use crate::model::Dataset;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write dataset to {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    #[error("Failed to read dataset from {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("Unexpected dataset header in {}: {found:?}", .path.display())]
    Header { path: PathBuf, found: Vec<String> },

    #[error("Invalid record at line {line}: {message}")]
    Record { line: u64, message: String },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for dataset sinks
///
/// Called exactly once per completed run, after all records are collected.
/// Implementations must not leave a partially written dataset visible when
/// they fail.
pub trait DatasetWriter: Send + Sync {
    /// Persists the dataset, replacing any previous one
    fn write(&self, dataset: &Dataset) -> OutputResult<()>;

    /// Human readable destination, used in log lines
    fn destination(&self) -> String;
}
