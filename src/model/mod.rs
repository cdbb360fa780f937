//! Data model for the scraping pipeline
//!
//! - `ListingEntry`: one product discovered on a listing page
//! - `BookRecord`: the typed, validated result of extracting a detail page
//! - `Dataset`: the ordered collection persisted at the end of a run

mod dataset;
mod listing;
mod record;

pub use dataset::Dataset;
pub use listing::ListingEntry;
pub use record::{BookRecord, Price, RecordError, RecordParts, DATASET_COLUMNS, NOT_FOUND};
