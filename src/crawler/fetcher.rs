//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building the HTTP client with the configured user agent and timeouts
//! - GET requests for listing and detail pages
//! - Retry with exponential backoff for transient failures
//! - Error classification (terminal status vs. exhausted retries)

use crate::config::FetchConfig;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: url::Url,
    /// HTTP status code
    pub status_code: u16,
    /// Page body
    pub body: String,
}

/// Why a fetch did not produce a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-success status that retrying will not fix
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Every attempt hit a transient failure (timeout, connection error, 5xx, 429)
    #[error("gave up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

impl FetchError {
    /// Returns true for a definitive answer from the server (e.g. 404)
    pub fn is_terminal_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

/// Outcome of a single attempt
enum Attempt {
    Done(FetchedPage),
    Terminal(FetchError),
    Transient(String),
}

/// Builds an HTTP client with proper configuration
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages with bounded retries
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return the body |
/// | HTTP 5xx, 429 | Retry with backoff |
/// | Timeout, connection error, body read error | Retry with backoff |
/// | Any other status | Immediate `FetchError::Status` |
///
/// The delay before retry `n` (1-based) is `retry_delay * 2^(n-1)`. After
/// `max_retries` retries the last failure is surfaced as
/// `FetchError::RetriesExhausted`.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    /// Creates a fetcher from configuration
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Fetches a URL, retrying transient failures
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let error = match self.attempt(url).await {
                Attempt::Done(page) => return Ok(page),
                Attempt::Terminal(err) => return Err(err),
                Attempt::Transient(error) => error,
            };

            if attempt > self.max_retries {
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.backoff(attempt);
            tracing::debug!(
                "Transient failure for {} (attempt {}): {}; retrying in {:?}",
                url,
                attempt,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Delay before the retry following attempt `attempt`
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_delay.saturating_mul(1u32 << exponent)
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Transient(classify_network_error(&e)),
        };

        let status = response.status();
        if is_transient_status(status) {
            return Attempt::Transient(format!("HTTP {}", status.as_u16()));
        }
        if !status.is_success() {
            return Attempt::Terminal(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        match response.text().await {
            Ok(body) => Attempt::Done(FetchedPage {
                final_url,
                status_code: status.as_u16(),
                body,
            }),
            Err(e) => Attempt::Transient(classify_network_error(&e)),
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn classify_network_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    }
}
