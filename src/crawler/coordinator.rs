//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that walks the ID space:
//! - Resuming from the stored checkpoint and skipping IDs already stored
//! - Fetching each ID and classifying the outcome
//! - Retrying transient failures on the same ID, up to a cap
//! - Stopping after a run of consecutive not-found responses
//! - Flushing extracted records together with the checkpoint

use crate::config::{Config, CrawlerConfig};
use crate::crawler::extractor::{Extraction, Extractor};
use crate::crawler::fetcher::{build_http_client, FetchOutcome, Fetcher};
use crate::state::{CrawlState, MissVerdict};
use crate::storage::{Checkpoint, SqliteStorage, Storage};
use crate::CrawlError;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

/// Why a crawl ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The consecutive-miss threshold was reached
    MissThreshold,
    /// The shutdown future resolved
    Interrupted,
}

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlCounts {
    /// Pages fetched successfully (with or without usable content)
    pub fetched: u64,
    /// Records committed to storage
    pub stored: u64,
    /// IDs skipped because they were already stored
    pub skipped: u64,
    /// Not-found responses
    pub misses: u64,
    /// Pages without a root container
    pub no_content: u64,
    /// Failed attempts that were retried or ended the crawl
    pub transient_failures: u64,
    /// Successful checkpoint commits
    pub flushes: u64,
}

/// Summary of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub stop_reason: StopReason,
    /// Checkpoint as committed by the final flush
    pub checkpoint: Checkpoint,
    pub counts: CrawlCounts,
}

/// Main crawler coordinator structure
///
/// Owns the storage, the fetcher, and the extractor for one source. The crawl
/// state itself is created per run and never leaves [`Coordinator::run_until`].
pub struct Coordinator<S: Storage = SqliteStorage> {
    config: CrawlerConfig,
    source: String,
    storage: S,
    fetcher: Fetcher,
    extractor: Extractor,
}

impl Coordinator<SqliteStorage> {
    /// Creates a coordinator backed by the configured SQLite database
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::with_storage(config, storage)
    }
}

impl<S: Storage> Coordinator<S> {
    /// Creates a coordinator over an already opened storage backend
    pub fn with_storage(config: Config, storage: S) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;

        Ok(Self {
            source: config.site.source.clone(),
            extractor: Extractor::from_site(&config.site),
            fetcher: Fetcher::new(client, config.site),
            config: config.crawler,
            storage,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Runs until the miss threshold is reached
    pub async fn run(&mut self) -> Result<CrawlReport, CrawlError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until the miss threshold is reached or `shutdown` resolves
    ///
    /// Shutdown is noticed while waiting on the network or a delay. An ID
    /// whose fetch was cut short is not counted as attempted, so the next run
    /// probes it again. Whatever is buffered is flushed before returning,
    /// including after a fatal retry error; a storage error is returned as is.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Future that requests a graceful stop when it resolves
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl stopped at the miss threshold or on shutdown
    /// * `Err(CrawlError::RetriesExhausted)` - One ID kept failing past `max-retries`
    /// * `Err(CrawlError)` - Reading or writing storage failed
    pub async fn run_until<F: Future>(&mut self, shutdown: F) -> Result<CrawlReport, CrawlError> {
        let checkpoint = self
            .storage
            .read_checkpoint(&self.source)?
            .unwrap_or_else(|| Checkpoint::new(self.source.clone()));
        let existing_ids = self.storage.load_existing_ids(&self.source)?;

        tracing::info!(
            "Resuming '{}' at ID {} ({} records stored, {} ever succeeded)",
            self.source,
            checkpoint.next_id(),
            existing_ids.len(),
            checkpoint.total_success_count
        );

        let mut state = CrawlState::resume(checkpoint, existing_ids);
        let mut counts = CrawlCounts::default();
        tokio::pin!(shutdown);

        let stop_reason = loop {
            if state.is_existing() {
                tracing::debug!("ID {} already stored, skipping", state.current_id());
                counts.skipped += 1;
                state.skip();
                continue;
            }

            let id = state.current_id();
            let outcome = tokio::select! {
                biased;
                _ = shutdown.as_mut() => break StopReason::Interrupted,
                outcome = self.fetcher.fetch(id) => outcome,
            };

            match outcome {
                FetchOutcome::TransientFailure { cause } => {
                    counts.transient_failures += 1;
                    let attempts = state.record_transient_failure();

                    // The first attempt is not a retry
                    if attempts > self.config.max_retries {
                        tracing::error!("ID {} failed {} times, giving up: {}", id, attempts, cause);
                        self.flush(&mut state, &mut counts)?;
                        return Err(CrawlError::RetriesExhausted {
                            id,
                            attempts,
                            cause,
                        });
                    }

                    tracing::warn!(
                        "ID {} failed (retry {}/{}): {}; retrying in {:?}",
                        id,
                        attempts,
                        self.config.max_retries,
                        cause,
                        self.config.retry_delay()
                    );
                    if pause(self.config.retry_delay(), shutdown.as_mut()).await {
                        break StopReason::Interrupted;
                    }
                    continue;
                }

                FetchOutcome::Miss { status_code } => {
                    counts.misses += 1;
                    match state.record_miss(self.config.miss_threshold) {
                        MissVerdict::Continue { consecutive } => {
                            tracing::info!(
                                "ID {} not found (HTTP {}), consecutive misses: {}",
                                id,
                                status_code,
                                consecutive
                            );
                        }
                        MissVerdict::Exhausted { consecutive } => {
                            tracing::info!(
                                "ID {} not found, stopping after {} consecutive misses",
                                id,
                                consecutive
                            );
                            break StopReason::MissThreshold;
                        }
                    }
                }

                FetchOutcome::Success(document) => {
                    counts.fetched += 1;
                    state.record_found();

                    match self.extractor.extract(&document) {
                        Extraction::NoContent => {
                            tracing::warn!("ID {} has no content container, skipping", id);
                            counts.no_content += 1;
                            state.record_no_content();
                        }
                        Extraction::Record(record) => {
                            tracing::info!(
                                "ID {} extracted [{}] {}",
                                id,
                                record.category.as_deref().unwrap_or("-"),
                                record.title.as_deref().unwrap_or("(untitled)")
                            );
                            state.buffer(record);
                            if state.should_flush(self.config.flush_batch_size) {
                                self.flush(&mut state, &mut counts)?;
                            }
                        }
                    }
                }
            }

            if pause(self.config.request_delay(), shutdown.as_mut()).await {
                break StopReason::Interrupted;
            }
        };

        self.flush(&mut state, &mut counts)?;

        let checkpoint = state.committed().clone();
        tracing::info!(
            "Crawl of '{}' stopped ({:?}) at ID {}: {} stored this run, {} total",
            self.source,
            stop_reason,
            checkpoint.last_id,
            counts.stored,
            checkpoint.total_success_count
        );

        Ok(CrawlReport {
            stop_reason,
            checkpoint,
            counts,
        })
    }

    /// Commits the buffered batch and the pending checkpoint atomically
    fn flush(&mut self, state: &mut CrawlState, counts: &mut CrawlCounts) -> Result<(), CrawlError> {
        if state.batch_len() == 0 && state.pending() == state.committed() {
            return Ok(());
        }

        let (checkpoint, batch) = state.take_flush();
        self.storage.write_checkpoint_and_batch(&checkpoint, &batch)?;

        tracing::info!(
            "Flushed {} records for '{}' (last ID {}, {} total)",
            batch.len(),
            checkpoint.source,
            checkpoint.last_id,
            checkpoint.total_success_count
        );

        counts.stored += batch.len() as u64;
        counts.flushes += 1;
        state.commit(checkpoint);
        Ok(())
    }
}

/// Sleeps for `delay`; returns true if `shutdown` resolved first
async fn pause<F: Future>(delay: Duration, shutdown: Pin<&mut F>) -> bool {
    if delay.is_zero() {
        return false;
    }

    tokio::select! {
        biased;
        _ = shutdown => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

/// Opens the configured database and crawls until the miss threshold or `shutdown`
///
/// # Arguments
///
/// * `config` - Validated configuration; its database is created if missing
/// * `shutdown` - Future that requests a graceful stop when it resolves
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Why the crawl stopped and the committed checkpoint
/// * `Err(CrawlError)` - The database could not be opened or the crawl failed
///
/// # Example
///
/// ```no_run
/// use idcrawl::config::load_config;
/// use idcrawl::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let report = run_crawl(config, tokio::signal::ctrl_c()).await?;
/// println!("Stopped at ID {}", report.checkpoint.last_id);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl<F: Future>(config: Config, shutdown: F) -> Result<CrawlReport, CrawlError> {
    let mut coordinator = Coordinator::new(config)?;
    coordinator.run_until(shutdown).await
}
