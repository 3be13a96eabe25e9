//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! per-source statistics from the storage layer. It only reads.

use crate::storage::{Checkpoint, Storage};
use crate::CrawlError;

/// Inclusive range of publication years counted in the yearly breakdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearWindow {
    pub from: Option<i32>,
    pub to: Option<i32>,
}

/// Crawl statistics for one source
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub source: String,

    /// Total number of stored records
    pub total_records: u64,

    /// Records per publication year, ascending
    pub records_per_year: Vec<(i32, u64)>,

    /// Records per category, largest first; `None` is uncategorised
    pub records_per_category: Vec<(Option<String>, u64)>,

    /// Stored checkpoint, if the source was ever crawled
    pub checkpoint: Option<Checkpoint>,
}

impl CrawlStatistics {
    /// Records whose date could not be determined or fell outside the year window
    pub fn undated(&self) -> u64 {
        let dated: u64 = self.records_per_year.iter().map(|(_, n)| n).sum();
        self.total_records.saturating_sub(dated)
    }
}

/// Loads statistics for `source` from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to read from
/// * `source` - Source tag whose records are counted
/// * `years` - Inclusive year window for the yearly breakdown
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Counts and the stored checkpoint
/// * `Err(CrawlError)` - Failed to query storage
pub fn load_statistics(
    storage: &dyn Storage,
    source: &str,
    years: YearWindow,
) -> Result<CrawlStatistics, CrawlError> {
    Ok(CrawlStatistics {
        source: source.to_string(),
        total_records: storage.count_records(source)?,
        records_per_year: storage.count_by_year(source, years.from, years.to)?,
        records_per_category: storage.count_by_category(source)?,
        checkpoint: storage.read_checkpoint(source)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics: {} ===\n", stats.source);

    println!("Total records: {}", stats.total_records);
    match &stats.checkpoint {
        Some(checkpoint) => {
            println!("Last attempted ID: {}", checkpoint.last_id);
            println!(
                "Last seen date: {}",
                checkpoint
                    .last_seen_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!("Successes recorded: {}", checkpoint.total_success_count);
        }
        None => println!("No checkpoint stored yet"),
    }
    println!();

    println!("Records per Year:");
    for (year, count) in &stats.records_per_year {
        println!("  {}: {}", year, count);
    }
    let undated = stats.undated();
    if undated > 0 {
        println!("  (undated or outside window): {}", undated);
    }
    println!();

    println!("Records per Category:");
    for (category, count) in &stats.records_per_category {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  {}: {} ({:.1}%)",
            category.as_deref().unwrap_or("uncategorised"),
            count,
            percentage
        );
    }
}
