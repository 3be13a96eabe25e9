//! Mutable progress owned by the crawl loop
//!
//! Everything the loop needs to remember between IDs lives here: the ID being
//! probed, the consecutive-miss counter, the retry counter for the current ID,
//! the unflushed batch, and the checkpoint as it stands in memory.

use crate::storage::{Checkpoint, Record};
use std::collections::HashSet;
use std::mem;

/// What a miss did to the termination counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissVerdict {
    /// Below the threshold; keep probing
    Continue { consecutive: u32 },
    /// Threshold reached; the crawl is over
    Exhausted { consecutive: u32 },
}

/// Progress of one crawl over one source
#[derive(Debug, Clone)]
pub struct CrawlState {
    /// ID that will be probed next
    current_id: i64,

    /// Back-to-back not-found responses
    consecutive_misses: u32,

    /// Failed attempts at `current_id`
    attempts: u32,

    /// IDs durable before this run started
    existing_ids: HashSet<i64>,

    /// Records extracted but not yet flushed
    batch: Vec<Record>,

    /// Last durable checkpoint
    committed: Checkpoint,

    /// Checkpoint including everything buffered and attempted so far
    pending: Checkpoint,
}

impl CrawlState {
    /// Builds the resume state from the stored checkpoint and existing IDs
    ///
    /// Probing starts right after `checkpoint.last_id` (or at 1 for a
    /// checkpoint that was never written).
    pub fn resume(checkpoint: Checkpoint, existing_ids: HashSet<i64>) -> Self {
        Self {
            current_id: checkpoint.next_id(),
            consecutive_misses: 0,
            attempts: 0,
            existing_ids,
            batch: Vec::new(),
            committed: checkpoint.clone(),
            pending: checkpoint,
        }
    }

    pub fn current_id(&self) -> i64 {
        self.current_id
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    /// The durable checkpoint as of the last flush
    pub fn committed(&self) -> &Checkpoint {
        &self.committed
    }

    /// The checkpoint a flush right now would write
    pub fn pending(&self) -> &Checkpoint {
        &self.pending
    }

    /// Whether the current ID was stored before this run
    pub fn is_existing(&self) -> bool {
        self.existing_ids.contains(&self.current_id)
    }

    /// Moves past an already-stored ID without touching any counter
    pub fn skip(&mut self) {
        self.advance();
    }

    /// Counts a failed attempt at the current ID and returns the total so far
    pub fn record_transient_failure(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Counts a not-found response and advances unless the threshold is reached
    ///
    /// The current ID counts as attempted either way.
    pub fn record_miss(&mut self, threshold: u32) -> MissVerdict {
        self.consecutive_misses += 1;
        self.mark_attempted();

        if self.consecutive_misses >= threshold {
            MissVerdict::Exhausted {
                consecutive: self.consecutive_misses,
            }
        } else {
            self.advance();
            MissVerdict::Continue {
                consecutive: self.consecutive_misses,
            }
        }
    }

    /// Notes that the current ID exists, resetting the miss counter
    pub fn record_found(&mut self) {
        self.consecutive_misses = 0;
    }

    /// Moves past a page that existed but had no usable content
    pub fn record_no_content(&mut self) {
        self.mark_attempted();
        self.advance();
    }

    /// Buffers an extracted record and advances
    pub fn buffer(&mut self, record: Record) {
        self.pending.total_success_count += 1;
        if record.date.is_some() {
            self.pending.last_seen_date = record.date;
        }
        self.mark_attempted();
        self.batch.push(record);
        self.advance();
    }

    /// Whether the buffered batch has reached `flush_size`
    pub fn should_flush(&self, flush_size: usize) -> bool {
        self.batch.len() >= flush_size
    }

    /// Hands out the buffered batch and the checkpoint to commit with it
    ///
    /// The batch stays owned by the caller until [`CrawlState::commit`]; if
    /// the write fails the state is unchanged apart from the emptied buffer,
    /// which the caller is expected to abandon along with the crawl.
    pub fn take_flush(&mut self) -> (Checkpoint, Vec<Record>) {
        (self.pending.clone(), mem::take(&mut self.batch))
    }

    /// Records that `checkpoint` is now durable
    pub fn commit(&mut self, checkpoint: Checkpoint) {
        self.committed = checkpoint;
    }

    fn mark_attempted(&mut self) {
        self.pending.last_id = self.pending.last_id.max(self.current_id);
    }

    fn advance(&mut self) {
        self.current_id += 1;
        self.attempts = 0;
    }
}
