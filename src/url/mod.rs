//! URL handling module for Shelfscan
//!
//! Resolves listing-page hrefs and product image paths into absolute URLs,
//! and builds the paged listing endpoint.

use crate::{UrlError, UrlResult};
use url::Url;

/// Placeholder substituted with the page number in the listing path
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Parses a site or asset root
///
/// The path always ends with `/` afterwards, so relative paths joined onto
/// it land below the root rather than replacing its last segment.
///
/// # Examples
///
/// ```
/// use shelfscan::url::parse_root;
///
/// let root = parse_root("https://books.toscrape.com/shop").unwrap();
/// assert_eq!(root.as_str(), "https://books.toscrape.com/shop/");
/// ```
pub fn parse_root(root: &str) -> UrlResult<Url> {
    let mut url = Url::parse(root.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Builds the URL of listing page `page`
///
/// # Examples
///
/// ```
/// use shelfscan::url::{listing_page_url, parse_root};
///
/// let root = parse_root("https://books.toscrape.com/").unwrap();
/// let url = listing_page_url(&root, "catalogue/page-{page}.html", 3).unwrap();
/// assert_eq!(url.as_str(), "https://books.toscrape.com/catalogue/page-3.html");
/// ```
pub fn listing_page_url(root: &Url, template: &str, page: u32) -> UrlResult<Url> {
    if !template.contains(PAGE_PLACEHOLDER) {
        return Err(UrlError::MissingPlaceholder(template.to_string()));
    }

    let path = template.replace(PAGE_PLACEHOLDER, &page.to_string());
    root.join(path.trim_start_matches('/'))
        .map_err(|e| UrlError::Parse(e.to_string()))
}

/// Resolves a link href found on `base` to an absolute HTTP(S) URL
///
/// Returns None for empty hrefs, fragment-only anchors, non-HTTP schemes
/// and anything that fails to parse. The fragment is dropped so the same
/// product reached through different anchors compares equal.
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut absolute = base.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);

    Some(absolute)
}

/// Resolves an image `src` against the asset root
///
/// Leading `../` and `./` segments are removed first, so a path that climbs
/// out of the product directory is anchored at the asset root instead.
/// Already absolute sources are kept as they are.
///
/// # Examples
///
/// ```
/// use shelfscan::url::{parse_root, resolve_asset};
///
/// let root = parse_root("https://books.toscrape.com/").unwrap();
/// let image = resolve_asset("../../media/cache/fe/72/cover.jpg", &root).unwrap();
/// assert_eq!(image.as_str(), "https://books.toscrape.com/media/cache/fe/72/cover.jpg");
/// ```
pub fn resolve_asset(src: &str, root: &Url) -> Option<Url> {
    let src = src.trim();

    if src.is_empty() || src.starts_with("data:") {
        return None;
    }

    if let Ok(absolute) = Url::parse(src) {
        return matches!(absolute.scheme(), "http" | "https").then_some(absolute);
    }

    root.join(strip_relative_prefix(src)).ok()
}

/// Removes any run of leading `../` and `./` segments
fn strip_relative_prefix(mut path: &str) -> &str {
    loop {
        if let Some(rest) = path.strip_prefix("../") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else {
            return path.trim_start_matches('/');
        }
    }
}
