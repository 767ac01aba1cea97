//! Compute the root hash of a block as its items arrive.
//!
//! Items are routed into five [Streaming] trees by category. Once the footer has supplied the three
//! carried-forward hashes, the block root is assembled from a fixed-shape tree:
//!
//! ```text
//!                 root
//!                /    \
//!               t      *
//!                     /
//!                    *
//!              _____/ \_____
//!             /             \
//!            *               *
//!          /   \           /   \
//!         *     *         *     *
//!        / \   / \       / \   / \
//!       L1 L2 L3 L4     L5 L6 L7 L8
//! ```
//!
//! `t` is the leaf hash of the encoded block timestamp. L1 through L8 are, in order: the previous
//! block root, the root of the tree of all previous block hashes, the state root at the start of the
//! block, and the roots of the consensus header, input, output, state change and trace data trees.
//! The right child of the root has no sibling: that slot is reserved and is hashed as a
//! single-child node.

use crate::{
    wire::{block_item::Kind, Timestamp},
    Error, Item,
};
use blockstream_cryptography::{sha384::Digest, Sha384};
use blockstream_storage::merkle::{Standard, Streaming};
use prost::Message;
use tracing::trace;

/// Single-use accumulator for the root hash of one block.
pub struct BlockDigest {
    hasher: Standard<Sha384>,

    consensus_headers: Streaming<Sha384>,
    inputs: Streaming<Sha384>,
    outputs: Streaming<Sha384>,
    state_changes: Streaming<Sha384>,
    trace_data: Streaming<Sha384>,

    timestamp: Option<Timestamp>,
    previous_hash: Option<Digest>,
    previous_blocks_tree_hash: Option<Digest>,
    start_of_block_state_hash: Option<Digest>,

    finalized: bool,
}

impl Default for BlockDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDigest {
    pub fn new() -> Self {
        Self {
            hasher: Standard::new(),
            consensus_headers: Streaming::new(),
            inputs: Streaming::new(),
            outputs: Streaming::new(),
            state_changes: Streaming::new(),
            trace_data: Streaming::new(),
            timestamp: None,
            previous_hash: None,
            previous_blocks_tree_hash: None,
            start_of_block_state_hash: None,
            finalized: false,
        }
    }

    /// Routes `item` to the tree for its category.
    ///
    /// Footers are not hashed: they only supply the carried-forward hashes. Items of any other
    /// unrecognized category are ignored.
    pub fn add(&mut self, item: &Item) -> Result<(), Error> {
        if self.finalized {
            return Err(Error::Finalized);
        }

        let tree = match item.kind() {
            Some(Kind::BlockHeader(header)) => {
                self.timestamp = header.block_timestamp;
                &mut self.outputs
            }
            Some(Kind::BlockFooter(footer)) => {
                self.previous_hash = Some(footer.previous_block_root_hash.as_slice().try_into()?);
                self.previous_blocks_tree_hash =
                    Some(footer.root_hash_of_all_block_hashes_tree.as_slice().try_into()?);
                self.start_of_block_state_hash =
                    Some(footer.start_of_block_state_root_hash.as_slice().try_into()?);
                return Ok(());
            }
            Some(Kind::EventHeader(_)) | Some(Kind::RoundHeader(_)) => &mut self.consensus_headers,
            Some(Kind::TransactionOutput(_)) | Some(Kind::TransactionResult(_)) => {
                &mut self.outputs
            }
            Some(Kind::SignedTransaction(_)) => &mut self.inputs,
            Some(Kind::StateChanges(_)) => &mut self.state_changes,
            Some(Kind::TraceData(_)) => &mut self.trace_data,
            other => {
                trace!(kind = other.map(Kind::name), "skipping item");
                return Ok(());
            }
        };
        tree.add(item.raw());
        Ok(())
    }

    /// Returns the root hash of the block.
    ///
    /// Fails if the header timestamp or any footer hash is missing. After a successful call, the
    /// digest is finalized and rejects further use.
    pub fn digest(&mut self) -> Result<Digest, Error> {
        if self.finalized {
            return Err(Error::AlreadyDigested);
        }
        let (
            Some(timestamp),
            Some(previous_hash),
            Some(previous_blocks_tree_hash),
            Some(start_of_block_state_hash),
        ) = (
            self.timestamp,
            self.previous_hash,
            self.previous_blocks_tree_hash,
            self.start_of_block_state_hash,
        )
        else {
            return Err(Error::Incomplete);
        };

        let leaves = [
            previous_hash,
            previous_blocks_tree_hash,
            start_of_block_state_hash,
            self.consensus_headers.root(),
            self.inputs.root(),
            self.outputs.root(),
            self.state_changes.root(),
            self.trace_data.root(),
        ];
        let depth2_left = self.hasher.combine(&leaves)?;
        let depth1_right = self.hasher.single_digest(&depth2_left);
        let depth1_left = self.hasher.leaf_digest(&timestamp.encode_to_vec());
        let root = self.hasher.node_digest(&depth1_left, &depth1_right);

        self.finalized = true;
        Ok(root)
    }
}
