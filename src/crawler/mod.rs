//! Crawler module for the two-stage scraping pipeline
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with retry logic
//! - Catalog pagination and listing entry extraction
//! - Detail page extraction into book records
//! - Overall pipeline coordination

mod coordinator;
mod extractor;
mod fetcher;
mod paginator;

pub use coordinator::{run_scrape, Coordinator, EntrySource, RunOutcome};
pub use extractor::{
    extract, parse_detail_page, parse_price_text, parse_stock_count, rating_from_word,
    ExtractError, Skip, SkipReason,
};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher};
pub use paginator::{extract_product_links, ExhaustReason, ListingPage, Paginator, PaginatorState};
