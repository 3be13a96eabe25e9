//! Storage module for persisting crawl results
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Idempotent record upserts keyed by `(id, source)`
//! - Per-source checkpoints committed atomically with record batches
//! - Read-only aggregate queries for reporting

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::CrawlError;
use chrono::NaiveDate;
use std::path::Path;

/// Opens (creating if needed) the SQLite database at `path`
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CrawlError> {
    SqliteStorage::new(path)
}

/// One crawled item
///
/// Every field extracted from markup is optional; only `id`, `source` and
/// `url` are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub source: String,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    /// First paragraph of the content block
    pub summary: Option<String>,
    /// Remaining paragraphs, newline-joined
    pub body: Option<String>,
    pub url: String,
}

impl Record {
    /// Creates a record with no extracted fields
    pub fn new(id: i64, source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            source: source.into(),
            title: None,
            date: None,
            category: None,
            summary: None,
            body: None,
            url: url.into(),
        }
    }
}

/// Crawl progress for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub source: String,

    /// Highest ID whose attempt was fully classified (not necessarily stored)
    pub last_id: i64,

    /// Date of the most recent stored record that carried one
    pub last_seen_date: Option<NaiveDate>,

    /// Records ever stored for this source
    pub total_success_count: u64,
}

impl Checkpoint {
    /// A checkpoint for a source that has never been crawled
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            last_id: 0,
            last_seen_date: None,
            total_success_count: 0,
        }
    }

    /// The first ID a resumed crawl should probe
    pub fn next_id(&self) -> i64 {
        self.last_id + 1
    }
}
