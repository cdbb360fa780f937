use url::Url;

/// A product discovered on a listing page (or read from the seed file)
///
/// Consumed exactly once by the detail extractor and never persisted on its
/// own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Absolute URL of the product detail page
    pub detail_url: Url,

    /// Externally assigned ordinal from a previous crawl, if any
    pub index: Option<u64>,
}

impl ListingEntry {
    /// Creates an entry discovered fresh from a listing page
    pub fn new(detail_url: Url) -> Self {
        Self {
            detail_url,
            index: None,
        }
    }

    /// Creates an entry carrying an externally assigned index
    pub fn with_index(detail_url: Url, index: u64) -> Self {
        Self {
            detail_url,
            index: Some(index),
        }
    }
}
