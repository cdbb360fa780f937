//! Pipeline coordinator - main scrape orchestration logic
//!
//! This module contains the main loop that sequences the pipeline:
//! - Asking the entry source (paginator or seed table) for the next page
//! - Fanning the page's entries out to the detail extractor
//! - Restoring discovery order and accepting records
//! - Handling cancellation and the configured deadline
//! - Persisting the dataset once at the end

use crate::config::{Config, CrawlerConfig};
use crate::crawler::extractor::{extract, Skip};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::paginator::{ListingPage, Paginator};
use crate::model::{BookRecord, Dataset, ListingEntry};
use crate::output::{CsvDatasetWriter, DatasetWriter, RunStats};
use crate::seed::SeedTable;
use crate::url::parse_root;
use crate::{ConfigError, ScrapeError};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Where listing entries come from
pub enum EntrySource {
    /// Paginate the catalog listing
    Catalog(Paginator),
    /// Use the seed table's rows, all at once
    Seeded(Option<Vec<ListingEntry>>),
}

impl EntrySource {
    async fn next_page(&mut self) -> Option<ListingPage> {
        match self {
            Self::Catalog(paginator) => paginator.next_page().await,
            Self::Seeded(entries) => entries
                .take()
                .map(|entries| ListingPage { page: 1, entries }),
        }
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The source was exhausted and the dataset was written
    Completed { stats: RunStats, dataset: Dataset },

    /// The run was cancelled; `flushed` tells whether the partial dataset was written
    Cancelled { stats: RunStats, flushed: bool },
}

impl RunOutcome {
    pub fn stats(&self) -> &RunStats {
        match self {
            Self::Completed { stats, .. } | Self::Cancelled { stats, .. } => stats,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

enum Flow {
    Continue,
    Cancelled,
}

/// Main pipeline coordinator structure
pub struct Coordinator {
    crawler: CrawlerConfig,
    fetcher: Fetcher,
    asset_root: Arc<Url>,
    source: EntrySource,
    seed: Option<SeedTable>,
    writer: Box<dyn DatasetWriter>,
    stats: RunStats,
    records: Vec<BookRecord>,
    seen_links: HashSet<String>,
    next_index: u64,
}

impl Coordinator {
    /// Creates a coordinator that paginates the catalog
    ///
    /// When `output.seed-path` is configured, discovered entries whose URL
    /// appears in the seed table take the index recorded there.
    pub fn new(config: Config) -> Result<Self, ScrapeError> {
        let seed = load_seed(&config)?;
        let fetcher = Fetcher::new(&config.fetch)?;
        let root = parse_root(&config.site.base_url)?;
        let paginator = Paginator::new(fetcher.clone(), root, config.site.listing_path.clone())
            .with_max_pages(config.crawler.max_pages);

        Self::build(config, fetcher, EntrySource::Catalog(paginator), seed)
    }

    /// Creates a coordinator that scrapes exactly the seed table's URLs
    pub fn from_seed(config: Config) -> Result<Self, ScrapeError> {
        let seed = load_seed(&config)?.ok_or_else(|| {
            ConfigError::Validation("seeded runs require output.seed-path".to_string())
        })?;
        let fetcher = Fetcher::new(&config.fetch)?;
        let entries = seed.entries().to_vec();

        Self::build(config, fetcher, EntrySource::Seeded(Some(entries)), None)
    }

    fn build(
        config: Config,
        fetcher: Fetcher,
        source: EntrySource,
        seed: Option<SeedTable>,
    ) -> Result<Self, ScrapeError> {
        let asset_root = parse_root(config.site.asset_root())?;
        let writer = Box::new(CsvDatasetWriter::new(&config.output.dataset_path));

        Ok(Self {
            crawler: config.crawler,
            fetcher,
            asset_root: Arc::new(asset_root),
            source,
            seed,
            writer,
            stats: RunStats::new(),
            records: Vec::new(),
            seen_links: HashSet::new(),
            next_index: 0,
        })
    }

    /// Replaces the dataset sink
    pub fn with_writer(mut self, writer: Box<dyn DatasetWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Runs the pipeline to completion
    ///
    /// Equivalent to [`Coordinator::run_until_cancelled`] with a token that
    /// is only cancelled by the configured deadline.
    pub async fn run(&mut self) -> Result<RunOutcome, ScrapeError> {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// Runs the pipeline until the source is exhausted or `cancel` fires
    ///
    /// Per-item failures are logged and counted, never returned. The only
    /// error is a failure to persist the dataset.
    pub async fn run_until_cancelled(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, ScrapeError> {
        let cancel = cancel.child_token();
        let deadline = self.crawler.deadline_secs.map(|secs| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                tracing::warn!("Deadline of {}s reached, cancelling run", secs);
                token.cancel();
            })
        });

        let result = self.drive(&cancel).await;

        if let Some(handle) = deadline {
            handle.abort();
        }
        result
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Result<RunOutcome, ScrapeError> {
        tracing::info!("Starting scrape run");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                page = self.source.next_page() => Some(page),
            };

            let page = match next {
                None => return self.finish_cancelled(),
                Some(None) => break,
                Some(Some(page)) => page,
            };

            tracing::debug!("Page {} yielded {} entries", page.page, page.entries.len());
            if let Flow::Cancelled = self.process_entries(page.entries, cancel).await {
                return self.finish_cancelled();
            }
        }

        self.finish_completed()
    }

    /// Extracts one page's entries and accepts the results in discovery order
    async fn process_entries(
        &mut self,
        entries: Vec<ListingEntry>,
        cancel: &CancellationToken,
    ) -> Flow {
        let jobs: Vec<(ListingEntry, u64)> = entries
            .into_iter()
            .map(|entry| self.assign_index(entry))
            .collect();
        let urls: Vec<String> = jobs.iter().map(|(e, _)| e.detail_url.to_string()).collect();

        let semaphore = Arc::new(Semaphore::new(self.crawler.max_in_flight.max(1) as usize));
        let mut tasks = JoinSet::new();

        for (slot, (entry, index)) in jobs.into_iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let asset_root = Arc::clone(&self.asset_root);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (slot, extract(&fetcher, &entry, index, &asset_root).await)
            });
        }

        let mut results: Vec<Option<Result<BookRecord, Skip>>> =
            (0..urls.len()).map(|_| None).collect();

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                joined = tasks.join_next() => Some(joined),
            };

            match joined {
                None => {
                    tasks.abort_all();
                    return Flow::Cancelled;
                }
                Some(None) => break,
                Some(Some(Ok((slot, result)))) => results[slot] = Some(result),
                Some(Some(Err(e))) => tracing::error!("Extraction task failed: {}", e),
            }
        }

        for (url, result) in urls.iter().zip(results) {
            match result {
                Some(Ok(record)) => self.accept(record),
                Some(Err(skip)) => {
                    tracing::warn!("Skipping {}: {}", skip.url, skip.reason);
                    self.stats.record_skip(&skip.reason);
                }
                None => {
                    tracing::warn!("Skipping {}: extraction did not complete", url);
                    self.stats.skipped_malformed += 1;
                }
            }
        }

        Flow::Continue
    }

    /// Decides the `Index` value for an entry and counts it as discovered
    ///
    /// Precedence: the entry's own index, then the seed table, then the
    /// running discovery counter.
    fn assign_index(&mut self, mut entry: ListingEntry) -> (ListingEntry, u64) {
        if entry.index.is_none() {
            entry.index = self
                .seed
                .as_ref()
                .and_then(|seed| seed.index_for(&entry.detail_url));
        }

        let index = entry.index.unwrap_or(self.next_index);
        self.next_index += 1;
        self.stats.items_discovered += 1;
        (entry, index)
    }

    fn accept(&mut self, record: BookRecord) {
        if !self.seen_links.insert(record.link().to_string()) {
            tracing::debug!("Dropping duplicate record for {}", record.link());
            self.stats.duplicates_dropped += 1;
            return;
        }

        tracing::info!(
            "{}: {} - {} - Price: {} - Stock: {} - Rating: {}",
            record.index(),
            record.title(),
            record.category(),
            record.price(),
            record.stock(),
            record.rating()
        );
        self.stats.items_accepted += 1;
        self.records.push(record);
    }

    fn record_pagination(&mut self) {
        if let EntrySource::Catalog(paginator) = &self.source {
            self.stats.pages_visited = paginator.pages_visited();
            self.stats.end_reason = paginator.exhaust_reason().cloned();
        }
    }

    fn finish_completed(&mut self) -> Result<RunOutcome, ScrapeError> {
        self.record_pagination();
        let dataset = Dataset::new(std::mem::take(&mut self.records));

        tracing::info!(
            "Writing {} records to {}",
            dataset.len(),
            self.writer.destination()
        );
        self.writer.write(&dataset)?;
        self.stats.finish();

        tracing::info!(
            "Scrape completed: {} accepted, {} skipped, {} pages visited",
            self.stats.items_accepted,
            self.stats.items_skipped(),
            self.stats.pages_visited
        );

        Ok(RunOutcome::Completed {
            stats: self.stats.clone(),
            dataset,
        })
    }

    fn finish_cancelled(&mut self) -> Result<RunOutcome, ScrapeError> {
        self.record_pagination();
        let dataset = Dataset::new(std::mem::take(&mut self.records));

        let flushed = if self.crawler.flush_on_cancel {
            tracing::warn!(
                "Run cancelled, flushing {} records to {}",
                dataset.len(),
                self.writer.destination()
            );
            self.writer.write(&dataset)?;
            true
        } else {
            tracing::warn!(
                "Run cancelled, discarding {} accumulated records",
                dataset.len()
            );
            false
        };
        self.stats.finish();

        Ok(RunOutcome::Cancelled {
            stats: self.stats.clone(),
            flushed,
        })
    }
}

fn load_seed(config: &Config) -> Result<Option<SeedTable>, ScrapeError> {
    let Some(path) = &config.output.seed_path else {
        return Ok(None);
    };
    let table = SeedTable::load(Path::new(path))?;
    tracing::info!("Loaded {} seed rows from {}", table.len(), path);
    Ok(Some(table))
}

/// Runs a complete scrape from configuration
///
/// # Example
///
/// ```no_run
/// use shelfscan::config::load_config;
/// use shelfscan::crawler::run_scrape;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("shelfscan.toml"))?;
/// let outcome = run_scrape(config).await?;
/// println!("accepted {}", outcome.stats().items_accepted);
/// # Ok(())
/// # }
/// ```
pub async fn run_scrape(config: Config) -> Result<RunOutcome, ScrapeError> {
    let mut coordinator = Coordinator::new(config)?;
    coordinator.run().await
}
