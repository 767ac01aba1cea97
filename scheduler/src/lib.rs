//! Select the block node to stream from, prioritized by configuration and latency.
//!
//! A mirror can stream the same blocks from several independent block nodes. A [Scheduler] picks
//! the [Node] that should provide the next block. Three policies are available (see [Kind]):
//!
//! * [Priority]: the first node (by configured priority) that has the block.
//! * [Latency]: the node with the lowest observed latency that has the block.
//! * [PriorityThenLatency]: the lowest latency node within the highest priority tier that has
//!   the block.
//!
//! Nodes that repeatedly fail to stream are marked inactive for a while. They are skipped unless
//! no active node has the block, in which case the first inactive node that has it is readmitted.
//!
//! # Latency
//!
//! The latency of a block is the time between the end of its consensus (the latest transaction
//! timestamp) and the moment its last item arrived. The latency-aware policies record it for the
//! current node as blocks are processed and ask to be rescheduled when another node in the same
//! group is faster by more than a configured threshold.
//!
//! Nodes that are not being streamed from are measured in the background by a [Prober]: one short
//! stream of the block the [Oracle] says is needed next, at most `backlog + 1` at a time. Each
//! selection bumps the prober's generation, so probes of a previous selection are dropped rather
//! than rescheduled.
//!
//! # Status
//!
//! `blockstream-scheduler` is **ALPHA** software. Developers should expect breaking changes and
//! occasional instability.

use blockstream_verifier::{Block, Verifier};
use std::{ops::RangeInclusive, time::Duration};
use thiserror::Error;

mod config;
pub use config::{Config, Kind, NodeConfig, ProbeConfig, Properties};
mod executor;
mod metrics;
mod node;
pub use node::{nodes, Node};
mod policy;
pub use policy::{new, Latency, Priority, PriorityThenLatency, Scheduler, Target};
mod prober;
pub use prober::Prober;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

/// Errors that can occur when selecting or streaming from a block node.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no block node can provide block {0}")]
    NoNode(u64),
    #[error("no block node has any block available")]
    NoBlocks,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no block received within {0:?}")]
    Timeout(Duration),
    #[error("verifier error: {0}")]
    Verifier(#[from] blockstream_verifier::Error),
    #[error("invalid config: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Connection to a single block node.
pub trait Client: Send + Sync + 'static {
    /// Returns the range of blocks the node can serve (`None` if it has none).
    fn status(&self) -> Result<Option<RangeInclusive<u64>>, Error>;

    /// Streams blocks from `start` through `end` (or indefinitely if `end` is `None`), passing each
    /// to `on_block` until it returns `false`.
    ///
    /// Fails with [Error::Timeout] if no block completes within `timeout`.
    fn stream(
        &self,
        start: u64,
        end: Option<u64>,
        timeout: Duration,
        on_block: &mut dyn FnMut(Block) -> bool,
    ) -> Result<(), Error>;

    /// Releases the connection.
    fn close(&self);
}

/// Source of the number of the block the mirror needs next.
pub trait Oracle: Send + Sync + 'static {
    /// Returns the next block number, or `None` if it is not known yet.
    fn next_block_number(&self) -> Option<u64>;
}

impl Oracle for Verifier {
    fn next_block_number(&self) -> Option<u64> {
        Verifier::next_block_number(self)
    }
}
