//! Output module for reporting on stored crawl results
//!
//! Everything here reads the store; nothing writes to it.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics, YearWindow};
