//! Build well-formed blocks for tests.

use crate::{
    wire::{
        block_item::Kind, BlockFooter, BlockHeader, BlockProof, EventHeader, RoundHeader,
        Timestamp, TransactionResult,
    },
    Block, BlockDigest, Item,
};
use blockstream_cryptography::sha384::Digest;
use std::time::SystemTime;

/// Status code of a successful transaction.
const SUCCESS: i32 = 22;

/// Returns the items of a block with two transactions.
///
/// The header is stamped `seconds` (plus 5ns) and the transactions reach consensus 1ns and 2ns
/// later. `footer` holds the previous block root, the previous blocks tree root and the start of
/// block state root, in that order.
pub fn items(number: u64, seconds: i64, footer: [[u8; 48]; 3]) -> Vec<Item> {
    let [previous, tree, state] = footer;
    vec![
        Kind::BlockHeader(BlockHeader {
            number,
            block_timestamp: Some(Timestamp::new(seconds, 5)),
        })
        .into(),
        Kind::RoundHeader(RoundHeader { round_number: 42 }).into(),
        Kind::EventHeader(EventHeader { creator_node_id: 3 }).into(),
        Kind::SignedTransaction(b"tx-1".to_vec()).into(),
        Kind::TransactionResult(TransactionResult {
            status: SUCCESS,
            consensus_timestamp: Some(Timestamp::new(seconds, 6)),
        })
        .into(),
        Kind::SignedTransaction(b"tx-2".to_vec()).into(),
        Kind::TransactionResult(TransactionResult {
            status: SUCCESS,
            consensus_timestamp: Some(Timestamp::new(seconds, 7)),
        })
        .into(),
        Kind::BlockFooter(BlockFooter {
            previous_block_root_hash: previous.to_vec(),
            root_hash_of_all_block_hashes_tree: tree.to_vec(),
            start_of_block_state_root_hash: state.to_vec(),
        })
        .into(),
        Kind::BlockProof(BlockProof {
            block: number,
            ..Default::default()
        })
        .into(),
    ]
}

/// Returns a [Block] of [items] received at the block's consensus time.
pub fn block(number: u64, seconds: i64, footer: [[u8; 48]; 3]) -> Block {
    let time =
        SystemTime::try_from(Timestamp::new(seconds, 0)).expect("mock timestamps are valid");
    Block {
        items: items(number, seconds, footer),
        started: time,
        completed: time,
    }
}

/// Produces consecutive blocks that link to each other by hash.
#[derive(Clone, Debug)]
pub struct Chain {
    number: u64,
    previous: Digest,
    seconds: i64,
}

impl Chain {
    /// Seconds between the consensus timestamps of consecutive blocks.
    pub const SPACING: i64 = 2;

    /// Creates a chain whose first block is `start`.
    pub fn new(start: u64) -> Self {
        Self {
            number: start,
            previous: Digest::from([0; 48]),
            seconds: 1_700_000_000 + start as i64 * Self::SPACING,
        }
    }

    /// Returns the number of the block [Self::next_block] will produce.
    pub fn peek(&self) -> u64 {
        self.number
    }

    /// Returns the next block in the chain.
    pub fn next_block(&mut self) -> Block {
        let mut previous = [0u8; 48];
        previous.copy_from_slice(&self.previous);
        let block = block(self.number, self.seconds, [previous, [0; 48], [0; 48]]);

        let mut digest = BlockDigest::new();
        for item in &block.items {
            digest.add(item).expect("mock items are well-formed");
        }
        self.previous = digest.digest().expect("mock blocks are complete");
        self.number += 1;
        self.seconds += Self::SPACING;
        block
    }
}
