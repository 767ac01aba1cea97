//! Recompute the root hash of the block a state proof's signature covers.
//!
//! A block proof may sign a later block than the one it is attached to. Its state proof carries
//! three [MerklePath]s. The second starts from the previous block root leaf of the current block
//! and climbs through sibling groups of four: the first group leads to the current block's root,
//! and the remaining siblings (combined with the timestamp leaf carried by the first path) lead to
//! the signed block's root. Within each group, the third sibling completes the implicit
//! single-child node beneath the root's right child.

use crate::{wire::MerklePath, Error};
use blockstream_cryptography::{sha384::Digest, Sha384};
use blockstream_storage::merkle::Standard;

/// Number of merkle paths in a state proof.
const PATH_COUNT: usize = 3;

/// Minimum siblings on the path from the previous block root.
pub const MIN_SIBLINGS: usize = 7;

/// Siblings needed to climb from a previous block root leaf to a block root.
const SIBLING_GROUP_SIZE: usize = 4;

/// Position (within a group) of the sibling after which the single-child node is hashed.
const PROMOTION_INDEX: usize = 2;

/// Returns the root hash of the block signed by the proof attached to `block`.
///
/// `current` is the root hash of `block` itself, as computed from its items. The intermediate hash
/// after the first sibling group must equal it.
pub fn root_hash(block: u64, current: &Digest, paths: &[MerklePath]) -> Result<Digest, Error> {
    if paths.len() != PATH_COUNT {
        return Err(Error::InvalidPathCount(block));
    }
    let path = &paths[1];
    if path.siblings.len() < MIN_SIBLINGS {
        return Err(Error::InsufficientSiblings(block, MIN_SIBLINGS));
    }

    let mut hasher = Standard::<Sha384>::new();
    let mut hash = Digest::try_from(path.hash.as_slice())?;
    for (i, sibling) in path.siblings.iter().enumerate() {
        let sibling_hash = Digest::try_from(sibling.hash.as_slice())?;
        hash = if sibling.is_left {
            hasher.node_digest(&sibling_hash, &hash)
        } else {
            hasher.node_digest(&hash, &sibling_hash)
        };

        if i % SIBLING_GROUP_SIZE == PROMOTION_INDEX {
            hash = hasher.single_digest(&hash);
        }

        if i == SIBLING_GROUP_SIZE - 1 && hash != *current {
            return Err(Error::RootMismatch {
                block,
                expected: *current,
                actual: hash,
            });
        }
    }

    let depth1_left = hasher.leaf_digest(&paths[0].timestamp_leaf);
    Ok(hasher.node_digest(&depth1_left, &hash))
}
