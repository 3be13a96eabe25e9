//! Crawler module for walking the ID space
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and outcome classification
//! - Field extraction from article pages
//! - The crawl loop with retry, termination, and checkpointing

mod coordinator;
mod extractor;
mod fetcher;

pub use coordinator::{run_crawl, Coordinator, CrawlCounts, CrawlReport, StopReason};
pub use extractor::{parse_date, Extraction, Extractor};
pub use fetcher::{build_http_client, Document, FetchOutcome, Fetcher};
