//! Domain-separated binary Merkle trees that can be built one leaf at a time.
//!
//! # Terminology
//!
//! Every node in a tree is either a _leaf_, an _internal node_ with two children, or an _internal
//! node_ with a single child. The three are hashed with distinct one-byte prefixes so that a value
//! of one kind can never be replayed as a value of another:
//!
//! ```text
//! leaf(data)          = H(0x00 || data)
//! single(child)       = H(0x01 || child)
//! node(left, right)   = H(0x02 || left || right)
//! ```
//!
//! A single-child node appears where the tree reserves a sibling slot that is not (yet) populated.
//!
//! # Streaming
//!
//! [Streaming] accepts leaves one at a time and keeps only the roots of the perfect subtrees
//! built so far (one per set bit of the leaf count), so memory stays logarithmic in the number of
//! leaves. Its root can be computed at any point without disturbing the accumulator:
//!
//! ```text
//!   After 5 leaves:
//!
//!            n(abcd)
//!           /      \
//!       n(ab)      n(cd)
//!       /  \       /  \
//!      a    b     c    d     e
//!
//!   pending = [n(abcd), e]
//!   root    = node(n(abcd), e)
//! ```
//!
//! # Example
//!
//! ```rust
//! use blockstream_cryptography::Sha384;
//! use blockstream_storage::merkle::Streaming;
//!
//! let mut tree = Streaming::<Sha384>::new();
//! tree.add(b"first");
//! let early = tree.root();
//! tree.add(b"second");
//! assert_ne!(early, tree.root());
//! ```

use thiserror::Error;

mod hasher;
mod streaming;

pub use hasher::{Standard, LEAF_PREFIX, NODE_PREFIX, SINGLE_CHILD_PREFIX};
pub use streaming::Streaming;

/// Errors that can occur when interacting with a Merkle tree.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("internal nodes have one or two children, got {0}")]
    InvalidChildCount(usize),
    #[error("leaf count must be a non-zero power of two, got {0}")]
    InvalidLeafCount(usize),
}
