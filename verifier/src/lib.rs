//! Verify the integrity of streamed blocks without buffering them.
//!
//! Block items are hashed as they arrive ([BlockDigest]) into the fixed-shape tree whose root the
//! network signs. Because a signature may cover a later block than the one it is attached to,
//! [proof::root_hash] recomputes that block's root from the state proof's merkle paths, checking
//! along the way that the proof passes through the current block's root.
//!
//! Around these primitives, [Assembler] groups item batches from a block node into complete
//! [Block]s, [read] summarizes a block (number, hashes and consensus times) and [Verifier] checks
//! that summaries form an unbroken hash chain.
//!
//! # Status
//!
//! `blockstream-verifier` is **ALPHA** software. Developers should expect breaking changes and
//! occasional instability.

use blockstream_cryptography::sha384::Digest;
use blockstream_storage::merkle;
use thiserror::Error;

mod assembler;
pub use assembler::Assembler;
mod block;
pub use block::{Block, Item};
mod chain;
pub use chain::{Tip, Verifier};
mod digest;
pub use digest::BlockDigest;
pub mod proof;
mod reader;
pub use reader::{read, Summary};
pub mod wire;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

/// Errors that can occur when verifying blocks.
#[derive(Error, Debug)]
pub enum Error {
    #[error("can't add more block items once finalized")]
    Finalized,
    #[error("block root hash already computed")]
    AlreadyDigested,
    #[error("block timestamp / previous hash / previous blocks tree hash / start of block state hash are not set")]
    Incomplete,
    #[error("number of merkle paths in block {0}'s state proof is not 3")]
    InvalidPathCount(u64),
    #[error("block {0}'s merkle path from the previous block root has less than {1} siblings")]
    InsufficientSiblings(u64, usize),
    #[error("block {block} root hash mismatch: expected={expected}, actual={actual}")]
    RootMismatch {
        block: u64,
        expected: Digest,
        actual: Digest,
    },
    #[error("received items of a new block while the previous block is still pending")]
    UnexpectedBlockStart,
    #[error("incorrect first block item: {0}")]
    UnexpectedFirstItem(&'static str),
    #[error("record file batch must contain exactly one item, received {0}")]
    InvalidRecordFile(usize),
    #[error("too many block items in a pending block: received {received}, limit {limit}")]
    TooManyItems { received: usize, limit: usize },
    #[error("invalid timestamp: seconds={seconds}, nanos={nanos}")]
    InvalidTimestamp { seconds: i64, nanos: i32 },
    #[error("non-consecutive block number: previous={previous}, current={current}")]
    NonConsecutive { previous: u64, current: u64 },
    #[error("block {block} previous hash mismatch: expected={expected}, actual={actual}")]
    PreviousHashMismatch {
        block: u64,
        expected: Digest,
        actual: Digest,
    },
    #[error("invalid digest: {0}")]
    Digest(#[from] blockstream_cryptography::Error),
    #[error("merkle error: {0}")]
    Merkle(#[from] merkle::Error),
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}
