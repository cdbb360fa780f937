//! The canonical book record and its field types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Value stored in the `Image` and `Description` columns when the page has none
pub const NOT_FOUND: &str = "not found";

/// Dataset header, in column order
///
/// The downstream query layer reads columns by these names.
pub const DATASET_COLUMNS: [&str; 9] = [
    "Title",
    "Category",
    "Price",
    "Stock",
    "Image",
    "Rating",
    "Link",
    "Description",
    "Index",
];

/// Errors raised when a record fails validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("rating must be between 0 and 5, got {0}")]
    RatingOutOfRange(u8),

    #[error("invalid price '{0}'")]
    InvalidPrice(String),
}

/// A currency amount without its symbol, held in hundredths
///
/// Displays as a bare number with two decimal digits.
///
/// # Examples
///
/// ```
/// use shelfscan::model::Price;
///
/// let price: Price = "51.77".parse().unwrap();
/// assert_eq!(price.cents(), 5177);
/// assert_eq!(price.to_string(), "51.77");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price {
    cents: u64,
}

impl Price {
    pub fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    pub fn cents(&self) -> u64 {
        self.cents
    }
}

impl FromStr for Price {
    type Err = RecordError;

    /// Parses `123`, `123.4` or `123.45`; anything else is rejected
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RecordError::InvalidPrice(s.to_string());
        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || fraction.len() > 2 || !all_digits(fraction) {
            return Err(invalid());
        }
        if s.contains('.') && fraction.is_empty() {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let fraction: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction))
            .map(Price::from_cents)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(serde::de::Error::custom)
    }
}

/// Field values gathered by the extractor before validation
#[derive(Debug, Clone)]
pub struct RecordParts {
    pub title: String,
    pub category: String,
    pub price: Price,
    pub stock: u32,
    pub image: String,
    pub rating: u8,
    pub link: String,
    pub description: String,
    pub index: u64,
}

/// One book, as persisted in the dataset
///
/// Fields serialize in [`DATASET_COLUMNS`] order. A record can only be
/// built through [`BookRecord::new`], which enforces that every field holds
/// a usable value: text fields are non-empty (missing image or description
/// become [`NOT_FOUND`]) and the rating is in `0..=5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Price")]
    price: Price,
    #[serde(rename = "Stock")]
    stock: u32,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "Rating")]
    rating: u8,
    #[serde(rename = "Link")]
    link: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Index")]
    index: u64,
}

impl BookRecord {
    /// Builds a validated record
    pub fn new(parts: RecordParts) -> Result<Self, RecordError> {
        let record = Self {
            title: parts.title.trim().to_string(),
            category: parts.category.trim().to_string(),
            price: parts.price,
            stock: parts.stock,
            image: or_not_found(parts.image),
            rating: parts.rating,
            link: parts.link.trim().to_string(),
            description: or_not_found(parts.description),
            index: parts.index,
        };
        record.validate()?;
        Ok(record)
    }

    /// Checks the record invariants
    ///
    /// Also used on records read back from disk.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.title.is_empty() {
            return Err(RecordError::EmptyField("title"));
        }
        if self.category.is_empty() {
            return Err(RecordError::EmptyField("category"));
        }
        if self.link.is_empty() {
            return Err(RecordError::EmptyField("link"));
        }
        if self.image.is_empty() {
            return Err(RecordError::EmptyField("image"));
        }
        if self.description.is_empty() {
            return Err(RecordError::EmptyField("description"));
        }
        if self.rating > 5 {
            return Err(RecordError::RatingOutOfRange(self.rating));
        }
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn index(&self) -> u64 {
        self.index
    }
}

fn or_not_found(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        NOT_FOUND.to_string()
    } else {
        trimmed.to_string()
    }
}
