//! State management for the crawl loop
//!
//! This module contains the in-memory progress of a crawl: which ID comes
//! next, how many misses in a row have been seen, and what is waiting to be
//! flushed.

mod crawl_state;

pub use crawl_state::{CrawlState, MissVerdict};
