use serde::Deserialize;

/// Main configuration structure for Shelfscan
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// Where the catalog lives
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site root, e.g. `https://books.toscrape.com/`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Listing page path relative to `base-url`, containing a `{page}` placeholder
    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,

    /// Root that product image paths are resolved against (defaults to `base-url`)
    #[serde(rename = "asset-root", default)]
    pub asset_root: Option<String>,
}

impl SiteConfig {
    /// Returns the asset root, falling back to the site root
    pub fn asset_root(&self) -> &str {
        self.asset_root.as_deref().unwrap_or(&self.base_url)
    }
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay, doubled on every retry (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Pipeline behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of detail pages fetched at once (1 = sequential)
    #[serde(rename = "max-in-flight", default = "default_max_in_flight")]
    pub max_in_flight: u32,

    /// Stop paginating after this many listing pages
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Cancel the whole run after this many seconds
    #[serde(rename = "deadline-secs", default)]
    pub deadline_secs: Option<u64>,

    /// Write the records accepted so far when the run is cancelled
    #[serde(rename = "flush-on-cancel", default)]
    pub flush_on_cancel: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            max_pages: None,
            deadline_secs: None,
            flush_on_cancel: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the CSV dataset, overwritten on every completed run
    #[serde(rename = "dataset-path")]
    pub dataset_path: String,

    /// Optional `url,index` correlation table
    #[serde(rename = "seed-path", default)]
    pub seed_path: Option<String>,
}

fn default_listing_path() -> String {
    "catalogue/page-{page}.html".to_string()
}

fn default_user_agent() -> String {
    format!("shelfscan/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_max_in_flight() -> u32 {
    1
}
