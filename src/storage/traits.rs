//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Checkpoint, Record};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt checkpoint value for {source_tag}.{key}: '{value}'")]
    Corrupt {
        source_tag: String,
        key: String,
        value: String,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawl loop is the only writer. Every write method is all-or-nothing:
/// on error nothing from the call is visible.
pub trait Storage {
    // ===== Records =====

    /// Inserts records, replacing any existing row with the same `(id, source)`
    fn upsert_batch(&mut self, records: &[Record]) -> StorageResult<()>;

    /// IDs already stored for `source`
    fn load_existing_ids(&self, source: &str) -> StorageResult<HashSet<i64>>;

    /// Gets a single record
    fn get_record(&self, id: i64, source: &str) -> StorageResult<Option<Record>>;

    // ===== Checkpoint =====

    /// Reads the checkpoint for `source`, if one was ever written
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The source was never crawled
    /// * `Err(StorageError::Corrupt)` - A stored progress value could not be parsed
    fn read_checkpoint(&self, source: &str) -> StorageResult<Option<Checkpoint>>;

    /// Commits `records` and `checkpoint` in a single transaction
    ///
    /// The stored `last_id` and `total_success_count` never decrease: the
    /// larger of the stored and supplied values is kept.
    ///
    /// # Arguments
    ///
    /// * `checkpoint` - Progress to record for `checkpoint.source`
    /// * `records` - Records to upsert; may be empty
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Both the records and the checkpoint are durable
    /// * `Err(StorageError)` - Nothing from this call was written
    fn write_checkpoint_and_batch(
        &mut self,
        checkpoint: &Checkpoint,
        records: &[Record],
    ) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts records stored for `source`
    fn count_records(&self, source: &str) -> StorageResult<u64>;

    /// Record counts per category, largest first; `None` is uncategorised
    fn count_by_category(&self, source: &str) -> StorageResult<Vec<(Option<String>, u64)>>;

    /// Record counts per publication year, ascending, within the inclusive window
    fn count_by_year(
        &self,
        source: &str,
        from_year: Option<i32>,
        to_year: Option<i32>,
    ) -> StorageResult<Vec<(i32, u64)>>;
}
