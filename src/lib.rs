//! Shelfscan: a two-stage book catalog scraper
//!
//! This crate walks a paged product listing until it runs out of pages,
//! fetches every product detail page it discovers, extracts a typed
//! [`BookRecord`] from each one and persists the whole run as a CSV dataset.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod seed;
pub mod url;

use thiserror::Error;

/// Main error type for Shelfscan operations
///
/// Per-item failures never surface here: they are turned into skips by the
/// crawler. Only setup problems and the final dataset write end up as a
/// `ScrapeError`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Seed file error: {0}")]
    Seed(#[from] seed::SeedError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Listing path template has no {{page}} placeholder: {0}")]
    MissingPlaceholder(String),
}

/// Result type alias for Shelfscan operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunOutcome};
pub use model::{BookRecord, Dataset, ListingEntry, Price};
