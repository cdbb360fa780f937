//! Detail page extraction
//!
//! Turns one product detail page into a [`BookRecord`]. Title, category,
//! price and stock are required; image and description fall back to
//! [`NOT_FOUND`]; an unrecognized rating becomes `0`. Any failure is reported
//! as a [`Skip`] so the caller can carry on with the next entry.

use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::model::{BookRecord, ListingEntry, RecordError, RecordParts, NOT_FOUND};
use crate::url::resolve_asset;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Anchors around the quantity in "In stock (22 available)"
const STOCK_PREFIX: &str = "In stock (";
const STOCK_SUFFIX: &str = " available)";

/// Why a detail page could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("no stock count in '{0}'")]
    NoStockDigits(String),

    #[error("unparsable price '{0}'")]
    InvalidPrice(String),

    #[error("invalid selector '{0}'")]
    Selector(&'static str),

    #[error("invalid record: {0}")]
    Record(#[from] RecordError),
}

/// Why an entry produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The detail page could not be fetched
    FetchFailure(FetchError),
    /// The detail page was fetched but is missing required data
    Malformed(ExtractError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailure(e) => write!(f, "fetch failure: {}", e),
            Self::Malformed(e) => write!(f, "malformed page: {}", e),
        }
    }
}

/// A skipped entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub url: String,
    pub reason: SkipReason,
}

/// Fetches and parses one listing entry
///
/// `index` is the value written to the record's `Index` column; the caller
/// decides it from the entry or from discovery order.
pub async fn extract(
    fetcher: &Fetcher,
    entry: &ListingEntry,
    index: u64,
    asset_root: &Url,
) -> Result<BookRecord, Skip> {
    let skip = |reason| Skip {
        url: entry.detail_url.to_string(),
        reason,
    };

    let page = fetcher
        .fetch(entry.detail_url.as_str())
        .await
        .map_err(|e| skip(SkipReason::FetchFailure(e)))?;

    parse_detail_page(&page.body, &entry.detail_url, index, asset_root)
        .map_err(|e| skip(SkipReason::Malformed(e)))
}

/// Parses a detail page into a validated record
///
/// # Arguments
///
/// * `html` - The detail page body
/// * `link` - URL the page was requested from (stored as `Link`)
/// * `index` - Value for the `Index` column
/// * `asset_root` - Root that relative image paths are resolved against
pub fn parse_detail_page(
    html: &str,
    link: &Url,
    index: u64,
    asset_root: &Url,
) -> Result<BookRecord, ExtractError> {
    let document = Html::parse_document(html);

    let title = extract_title(&document)?;
    let category = extract_category(&document)?;

    let price_text = first_text(&document, "p.price_color")?.ok_or(ExtractError::Missing("price"))?;
    let price = parse_price_text(&price_text)?;

    let stock_text = extract_availability(&document)?.ok_or(ExtractError::Missing("availability"))?;
    let stock = parse_stock_count(&stock_text)?;

    let image = extract_image(&document, asset_root)?
        .map(|url| url.to_string())
        .unwrap_or_else(|| NOT_FOUND.to_string());
    let description = extract_description(&document)?.unwrap_or_else(|| NOT_FOUND.to_string());
    let rating = extract_rating(&document)?;

    Ok(BookRecord::new(RecordParts {
        title,
        category,
        price,
        stock,
        image,
        rating,
        link: link.to_string(),
        description,
        index,
    })?)
}

/// Maps the star-rating class word to its value; anything else is `0`
///
/// # Examples
///
/// ```
/// use shelfscan::crawler::rating_from_word;
///
/// assert_eq!(rating_from_word("Three"), 3);
/// assert_eq!(rating_from_word("star-rating"), 0);
/// ```
pub fn rating_from_word(word: &str) -> u8 {
    match word {
        "One" => 1,
        "Two" => 2,
        "Three" => 3,
        "Four" => 4,
        "Five" => 5,
        _ => 0,
    }
}

/// Strips the currency symbol and parses the amount
///
/// Accepts `£51.77`, a mis-decoded `Â£51.77`, or a bare `51.77`. Only the
/// currency glyph is stripped, so `£.99` or `£-5.00` are rejected.
pub fn parse_price_text(text: &str) -> Result<crate::model::Price, ExtractError> {
    let amount = text
        .trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
        .trim_end()
        .replace(',', "");

    amount
        .parse()
        .map_err(|_| ExtractError::InvalidPrice(text.trim().to_string()))
}

/// Extracts the available quantity from an availability sentence
///
/// When the text has the `In stock (N available)` shape, only the run
/// between the two anchors is considered. Otherwise the first run of
/// digits in the text is used. No digits at all is an error, never a
/// default of zero.
///
/// # Examples
///
/// ```
/// use shelfscan::crawler::parse_stock_count;
///
/// assert_eq!(parse_stock_count("In stock (22 available)").unwrap(), 22);
/// assert!(parse_stock_count("Out of stock").is_err());
/// ```
pub fn parse_stock_count(text: &str) -> Result<u32, ExtractError> {
    let normalized = collapse_whitespace(text);

    let anchored = normalized
        .split_once(STOCK_PREFIX)
        .and_then(|(_, rest)| rest.split_once(STOCK_SUFFIX))
        .map(|(count, _)| count);

    let digits = first_digit_run(anchored.unwrap_or(&normalized))
        .ok_or_else(|| ExtractError::NoStockDigits(normalized.clone()))?;

    digits
        .parse()
        .map_err(|_| ExtractError::NoStockDigits(normalized.clone()))
}

fn first_digit_run(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn selector(css: &'static str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Text of the first element matching `css`, if it has any
fn first_text(document: &Html, css: &'static str) -> Result<Option<String>, ExtractError> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .map(element_text)
        .find(|text| !text.is_empty()))
}

/// The primary heading, falling back to the active breadcrumb item
fn extract_title(document: &Html) -> Result<String, ExtractError> {
    if let Some(title) = first_text(document, "h1")? {
        return Ok(title);
    }
    first_text(document, "ul.breadcrumb li.active")?.ok_or(ExtractError::Missing("title"))
}

/// The last linked breadcrumb segment
fn extract_category(document: &Html) -> Result<String, ExtractError> {
    let sel = selector("ul.breadcrumb li a")?;
    document
        .select(&sel)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .last()
        .ok_or(ExtractError::Missing("category"))
}

/// The availability sentence, from the summary paragraph or the info table
fn extract_availability(document: &Html) -> Result<Option<String>, ExtractError> {
    if let Some(text) = first_text(document, "p.availability")? {
        return Ok(Some(text));
    }

    let rows = selector("table tr")?;
    let header = selector("th")?;
    let cell = selector("td")?;

    Ok(document.select(&rows).find_map(|row| {
        let label = row.select(&header).next().map(element_text)?;
        if label.eq_ignore_ascii_case("Availability") {
            row.select(&cell).next().map(element_text)
        } else {
            None
        }
    }))
}

fn extract_image(document: &Html, asset_root: &Url) -> Result<Option<Url>, ExtractError> {
    for css in ["#product_gallery img[src]", "article.product_page img[src]"] {
        let sel = selector(css)?;
        if let Some(src) = document
            .select(&sel)
            .find_map(|img| img.value().attr("src"))
        {
            return Ok(resolve_asset(src, asset_root));
        }
    }
    Ok(None)
}

/// The paragraph following the description marker
fn extract_description(document: &Html) -> Result<Option<String>, ExtractError> {
    let sel = selector("#product_description")?;
    let Some(marker) = document.select(&sel).next() else {
        return Ok(None);
    };

    Ok(marker
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "p")
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty()))
}

fn extract_rating(document: &Html) -> Result<u8, ExtractError> {
    let sel = selector("p.star-rating")?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|p| {
            p.value()
                .classes()
                .map(rating_from_word)
                .find(|&rating| rating > 0)
        })
        .unwrap_or(0))
}
