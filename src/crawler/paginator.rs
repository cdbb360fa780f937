//! Catalog paginator
//!
//! Walks listing pages 1, 2, 3, ... and yields the product entries found on
//! each one, until a page is missing, empty or unavailable.

use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::model::ListingEntry;
use crate::url::{listing_page_url, resolve_link};
use crate::UrlResult;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Why pagination stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExhaustReason {
    /// The page exists but lists no products
    EmptyPage { page: u32 },
    /// Every product on the page was already listed on an earlier page
    NoNewEntries { page: u32 },
    /// The server answered the page with a terminal status such as 404
    NoSuchPage { page: u32, status: u16 },
    /// The page kept failing with transient errors until retries ran out
    Unavailable { page: u32, error: String },
    /// The configured page limit was reached
    PageLimit { page: u32 },
}

impl ExhaustReason {
    /// True when the catalog ended normally rather than because the site failed
    pub fn is_end_of_catalog(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPage { page } => write!(f, "page {} lists no products", page),
            Self::NoNewEntries { page } => {
                write!(f, "page {} only repeats products already seen", page)
            }
            Self::NoSuchPage { page, status } => {
                write!(f, "page {} answered HTTP {}", page, status)
            }
            Self::Unavailable { page, error } => write!(f, "page {} unavailable: {}", page, error),
            Self::PageLimit { page } => write!(f, "page limit reached after page {}", page),
        }
    }
}

/// Paginator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginatorState {
    /// Page `page` is the next one to request
    Fetching { page: u32 },
    /// Page `page` produced entries; the next call moves on to `page + 1`
    HasMore { page: u32 },
    /// No more pages will be requested
    Exhausted(ExhaustReason),
}

/// Entries found on one listing page
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub page: u32,
    pub entries: Vec<ListingEntry>,
}

/// Iterates the paged product listing
pub struct Paginator {
    fetcher: Fetcher,
    root: Url,
    listing_path: String,
    max_pages: Option<u32>,
    state: PaginatorState,
    seen: HashSet<String>,
    pages_visited: u32,
}

impl Paginator {
    /// Creates a paginator starting at page 1
    pub fn new(fetcher: Fetcher, root: Url, listing_path: impl Into<String>) -> Self {
        Self {
            fetcher,
            root,
            listing_path: listing_path.into(),
            max_pages: None,
            state: PaginatorState::Fetching { page: 1 },
            seen: HashSet::new(),
            pages_visited: 0,
        }
    }

    /// Stops after `max_pages` pages have produced entries
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn state(&self) -> &PaginatorState {
        &self.state
    }

    /// Number of listing pages requested so far
    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    /// The reason pagination ended, once it has
    pub fn exhaust_reason(&self) -> Option<&ExhaustReason> {
        match &self.state {
            PaginatorState::Exhausted(reason) => Some(reason),
            _ => None,
        }
    }

    /// URL of listing page `page`
    pub fn page_url(&self, page: u32) -> UrlResult<Url> {
        listing_page_url(&self.root, &self.listing_path, page)
    }

    /// Requests the next page and returns its entries
    ///
    /// Returns None once the paginator is exhausted; it never requests
    /// another page after that.
    pub async fn next_page(&mut self) -> Option<ListingPage> {
        let page = match self.state {
            PaginatorState::Exhausted(_) => return None,
            PaginatorState::Fetching { page } => page,
            PaginatorState::HasMore { page } => {
                if self.max_pages.is_some_and(|max| page >= max) {
                    tracing::info!("Page limit of {} reached", page);
                    self.state = PaginatorState::Exhausted(ExhaustReason::PageLimit { page });
                    return None;
                }
                page + 1
            }
        };
        self.state = PaginatorState::Fetching { page };

        let url = match self.page_url(page) {
            Ok(url) => url,
            Err(e) => {
                return self.exhaust(ExhaustReason::Unavailable {
                    page,
                    error: e.to_string(),
                })
            }
        };

        self.pages_visited += 1;
        tracing::info!("Scraping listing page {} ({})", page, url);

        let fetched = match self.fetcher.fetch(url.as_str()).await {
            Ok(fetched) => fetched,
            Err(FetchError::Status { status, .. }) => {
                return self.exhaust(ExhaustReason::NoSuchPage { page, status })
            }
            Err(e) => {
                return self.exhaust(ExhaustReason::Unavailable {
                    page,
                    error: e.to_string(),
                })
            }
        };

        let links = extract_product_links(&fetched.body, &fetched.final_url);
        if links.is_empty() {
            return self.exhaust(ExhaustReason::EmptyPage { page });
        }

        let found = links.len();
        let entries: Vec<ListingEntry> = links
            .into_iter()
            .filter(|link| self.seen.insert(link.to_string()))
            .map(ListingEntry::new)
            .collect();
        if entries.is_empty() {
            return self.exhaust(ExhaustReason::NoNewEntries { page });
        }
        if entries.len() < found {
            tracing::debug!(
                "Dropped {} repeated product links on page {}",
                found - entries.len(),
                page
            );
        }

        self.state = PaginatorState::HasMore { page };
        Some(ListingPage { page, entries })
    }

    fn exhaust(&mut self, reason: ExhaustReason) -> Option<ListingPage> {
        if reason.is_end_of_catalog() {
            tracing::info!("Pagination finished: {}", reason);
        } else {
            tracing::warn!("Pagination interrupted: {}", reason);
        }
        self.state = PaginatorState::Exhausted(reason);
        None
    }
}

/// Extracts product detail links from a listing page, in document order
///
/// Each product is an `article.product_pod` whose heading links to the
/// detail page. Links are resolved against the listing page URL.
pub fn extract_product_links(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("article.product_pod h3 a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(href, page_url))
        .collect()
}
