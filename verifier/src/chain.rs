//! Verify that blocks form an unbroken hash chain.

use crate::{Error, Summary};
use blockstream_cryptography::sha384::Digest;
use std::sync::Mutex;
use tracing::debug;

/// The last block accepted by a [Verifier].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tip {
    pub number: u64,
    pub hash: Digest,
}

/// Tracks the tip of a verified chain of blocks.
///
/// The tip is shared with background readers (such as latency probes asking which block is needed
/// next), so it is guarded by a lock.
#[derive(Debug, Default)]
pub struct Verifier {
    tip: Mutex<Option<Tip>>,
}

impl Verifier {
    /// Creates a verifier that accepts any first block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a verifier whose next block must follow `tip`.
    pub fn with_tip(tip: Tip) -> Self {
        Self {
            tip: Mutex::new(Some(tip)),
        }
    }

    /// Checks that `summary` follows the current tip and, if so, makes it the new tip.
    pub fn verify(&self, summary: &Summary) -> Result<(), Error> {
        let mut tip = self.tip.lock().unwrap();
        if let Some(last) = tip.as_ref() {
            if last.number.checked_add(1) != Some(summary.number) {
                return Err(Error::NonConsecutive {
                    previous: last.number,
                    current: summary.number,
                });
            }
            if summary.previous_hash != last.hash {
                return Err(Error::PreviousHashMismatch {
                    block: summary.number,
                    expected: last.hash,
                    actual: summary.previous_hash,
                });
            }
        }

        debug!(number = summary.number, hash = %summary.hash, "verified block");
        *tip = Some(Tip {
            number: summary.number,
            hash: summary.hash,
        });
        Ok(())
    }

    /// Returns the last verified block.
    pub fn tip(&self) -> Option<Tip> {
        *self.tip.lock().unwrap()
    }

    /// Returns the number of the block that must be verified next, if known.
    ///
    /// A tip at [u64::MAX] has no successor.
    pub fn next_block_number(&self) -> Option<u64> {
        self.tip().and_then(|tip| tip.number.checked_add(1))
    }
}
