//! Protobuf messages exchanged on a block stream.
//!
//! Only the fields needed to route, hash and verify block items are modeled. Unknown fields are
//! skipped on decode, but the exact bytes of every item are retained by [crate::Item] so hashes
//! always cover what was received.

use crate::Error;
use prost::Message;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SECOND: u32 = 1_000_000_000;

#[derive(Clone, Copy, PartialEq, Eq, Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let since = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            seconds: since.as_secs() as i64,
            nanos: since.subsec_nanos() as i32,
        }
    }
}

impl TryFrom<Timestamp> for SystemTime {
    type Error = Error;

    /// Times before the epoch saturate to the epoch. Nanos outside `0..1_000_000_000` and times
    /// past the latest representable [SystemTime] are rejected.
    fn try_from(timestamp: Timestamp) -> Result<Self, Error> {
        let invalid = || Error::InvalidTimestamp {
            seconds: timestamp.seconds,
            nanos: timestamp.nanos,
        };
        let nanos = u32::try_from(timestamp.nanos)
            .ok()
            .filter(|nanos| *nanos < NANOS_PER_SECOND)
            .ok_or_else(invalid)?;
        let Ok(seconds) = u64::try_from(timestamp.seconds) else {
            return Ok(UNIX_EPOCH);
        };
        UNIX_EPOCH
            .checked_add(Duration::new(seconds, nanos))
            .ok_or_else(invalid)
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct BlockHeader {
    #[prost(uint64, tag = "3")]
    pub number: u64,
    #[prost(message, optional, tag = "4")]
    pub block_timestamp: Option<Timestamp>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EventHeader {
    #[prost(int64, tag = "1")]
    pub creator_node_id: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct RoundHeader {
    #[prost(uint64, tag = "1")]
    pub round_number: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct TransactionResult {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub consensus_timestamp: Option<Timestamp>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TransactionOutput {
    #[prost(bytes = "vec", tag = "1")]
    pub body: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StateChanges {
    #[prost(message, optional, tag = "1")]
    pub consensus_timestamp: Option<Timestamp>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub changes: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FilteredItemHash {
    #[prost(bytes = "vec", tag = "1")]
    pub item_hash: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RecordFileItem {
    #[prost(bytes = "vec", tag = "1")]
    pub contents: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TraceData {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

/// Hashes carried forward from previous blocks.
#[derive(Clone, PartialEq, Message)]
pub struct BlockFooter {
    #[prost(bytes = "vec", tag = "1")]
    pub previous_block_root_hash: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub root_hash_of_all_block_hashes_tree: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub start_of_block_state_root_hash: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SiblingNode {
    #[prost(bool, tag = "1")]
    pub is_left: bool,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MerklePath {
    #[prost(bytes = "vec", tag = "1")]
    pub timestamp_leaf: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
    #[prost(message, repeated, tag = "3")]
    pub siblings: Vec<SiblingNode>,
    #[prost(int32, tag = "4")]
    pub next_path_index: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct StateProof {
    #[prost(message, repeated, tag = "1")]
    pub paths: Vec<MerklePath>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BlockProof {
    #[prost(uint64, tag = "1")]
    pub block: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub block_signature: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub state_proof: Option<StateProof>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BlockItem {
    #[prost(oneof = "block_item::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12")]
    pub kind: Option<block_item::Kind>,
}

pub mod block_item {
    use super::*;

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BlockHeader(BlockHeader),
        #[prost(message, tag = "2")]
        EventHeader(EventHeader),
        #[prost(message, tag = "3")]
        RoundHeader(RoundHeader),
        #[prost(bytes, tag = "4")]
        SignedTransaction(Vec<u8>),
        #[prost(message, tag = "5")]
        TransactionResult(TransactionResult),
        #[prost(message, tag = "6")]
        TransactionOutput(TransactionOutput),
        #[prost(message, tag = "7")]
        StateChanges(StateChanges),
        #[prost(message, tag = "8")]
        FilteredItemHash(FilteredItemHash),
        #[prost(message, tag = "9")]
        BlockProof(BlockProof),
        #[prost(message, tag = "10")]
        RecordFile(RecordFileItem),
        #[prost(message, tag = "11")]
        TraceData(TraceData),
        #[prost(message, tag = "12")]
        BlockFooter(BlockFooter),
    }

    impl Kind {
        /// Short name of the variant, for logs and errors.
        pub fn name(&self) -> &'static str {
            match self {
                Kind::BlockHeader(_) => "block_header",
                Kind::EventHeader(_) => "event_header",
                Kind::RoundHeader(_) => "round_header",
                Kind::SignedTransaction(_) => "signed_transaction",
                Kind::TransactionResult(_) => "transaction_result",
                Kind::TransactionOutput(_) => "transaction_output",
                Kind::StateChanges(_) => "state_changes",
                Kind::FilteredItemHash(_) => "filtered_item_hash",
                Kind::BlockProof(_) => "block_proof",
                Kind::RecordFile(_) => "record_file",
                Kind::TraceData(_) => "trace_data",
                Kind::BlockFooter(_) => "block_footer",
            }
        }
    }
}
