//! Summarize a block for hash-chain verification and latency measurement.

use crate::{wire::block_item::Kind, Block, BlockDigest, Error};
use blockstream_cryptography::sha384::Digest;
use blockstream_utils::SystemTimeExt;
use std::time::SystemTime;

/// What a verifier and a scheduler need to know about a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub number: u64,
    pub hash: Digest,
    pub previous_hash: Digest,

    /// Block timestamp from the header.
    pub consensus_start: SystemTime,

    /// Latest transaction consensus timestamp (or the block timestamp if there are none).
    pub consensus_end: SystemTime,
}

impl Summary {
    /// Milliseconds between the end of consensus and `completed` (zero if `completed` is earlier).
    pub fn latency(&self, completed: SystemTime) -> u64 {
        completed
            .saturating_since(self.consensus_end)
            .as_millis()
            .min(u64::MAX as u128) as u64
    }
}

/// Hashes every item of `block` and extracts its [Summary].
pub fn read(block: &Block) -> Result<Summary, Error> {
    let mut digest = BlockDigest::new();
    let mut header = None;
    let mut previous_hash = None;
    let mut consensus_end: Option<SystemTime> = None;
    for item in &block.items {
        digest.add(item)?;
        match item.kind() {
            Some(Kind::BlockHeader(h)) => header = Some(h),
            Some(Kind::BlockFooter(footer)) => {
                previous_hash = Some(Digest::try_from(
                    footer.previous_block_root_hash.as_slice(),
                )?);
            }
            Some(Kind::TransactionResult(result)) => {
                if let Some(timestamp) = result.consensus_timestamp {
                    let timestamp = SystemTime::try_from(timestamp)?;
                    consensus_end = Some(consensus_end.map_or(timestamp, |end| end.max(timestamp)));
                }
            }
            _ => {}
        }
    }
    let hash = digest.digest()?;

    let (Some(header), Some(previous_hash)) = (header, previous_hash) else {
        return Err(Error::Incomplete);
    };
    let Some(timestamp) = header.block_timestamp else {
        return Err(Error::Incomplete);
    };
    let consensus_start = SystemTime::try_from(timestamp)?;
    Ok(Summary {
        number: header.number,
        hash,
        previous_hash,
        consensus_start,
        consensus_end: consensus_end.unwrap_or(consensus_start),
    })
}
