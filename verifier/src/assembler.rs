//! Assemble complete blocks from batches of items delivered by a block node.

use crate::{wire::block_item::Kind, Block, Error, Item};
use blockstream_utils::Clock;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Collects item batches until a block is complete.
///
/// A block starts with a batch whose first item is a block header (or a single record file item)
/// and ends with a batch whose last item is a block proof.
pub struct Assembler<E: Clock> {
    clock: E,
    max_items: usize,

    pending: Vec<Item>,
    started: Option<SystemTime>,
}

impl<E: Clock> Assembler<E> {
    /// Creates an assembler that rejects blocks with more than `max_items` items.
    pub fn new(clock: E, max_items: usize) -> Self {
        Self {
            clock,
            max_items,
            pending: Vec::new(),
            started: None,
        }
    }

    /// Adds a batch of items, returning the block it completes (if any).
    ///
    /// Any error discards the pending block.
    pub fn push(&mut self, batch: Vec<Item>) -> Result<Option<Block>, Error> {
        let result = self.append(batch);
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Discards any pending items.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.started = None;
    }

    /// Returns the number of items waiting for the rest of their block.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn append(&mut self, batch: Vec<Item>) -> Result<Option<Block>, Error> {
        let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
            warn!("received empty item batch");
            return Ok(None);
        };
        let starts_block = matches!(
            first.kind(),
            Some(Kind::BlockHeader(_)) | Some(Kind::RecordFile(_))
        );
        let record_file = matches!(first.kind(), Some(Kind::RecordFile(_)));
        let ends_block = record_file || matches!(last.kind(), Some(Kind::BlockProof(_)));

        if starts_block && !self.pending.is_empty() {
            return Err(Error::UnexpectedBlockStart);
        }
        if !starts_block && self.pending.is_empty() {
            return Err(Error::UnexpectedFirstItem(
                first.kind().map(Kind::name).unwrap_or("unknown"),
            ));
        }
        if record_file && batch.len() > 1 {
            return Err(Error::InvalidRecordFile(batch.len()));
        }
        let received = self.pending.len() + batch.len();
        if received > self.max_items {
            return Err(Error::TooManyItems {
                received,
                limit: self.max_items,
            });
        }

        if starts_block {
            self.started = Some(self.clock.current());
        }
        self.pending.extend(batch);
        if !ends_block {
            return Ok(None);
        }

        let completed = self.clock.current();
        let items = std::mem::take(&mut self.pending);
        let started = self.started.take().unwrap_or(completed);
        debug!(items = items.len(), "assembled block");
        Ok(Some(Block {
            items,
            started,
            completed,
        }))
    }
}
