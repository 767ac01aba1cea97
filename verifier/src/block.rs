use crate::{
    wire::{block_item::Kind, BlockItem},
    Error,
};
use bytes::Bytes;
use prost::Message;
use std::time::SystemTime;

/// A decoded [BlockItem] paired with the exact bytes it was decoded from.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    inner: BlockItem,
    raw: Bytes,
}

impl Item {
    /// Decodes an item, retaining `raw` for hashing.
    pub fn decode(raw: Bytes) -> Result<Self, Error> {
        let inner = BlockItem::decode(raw.clone())?;
        Ok(Self { inner, raw })
    }

    pub fn inner(&self) -> &BlockItem {
        &self.inner
    }

    pub fn kind(&self) -> Option<&Kind> {
        self.inner.kind.as_ref()
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl From<BlockItem> for Item {
    fn from(inner: BlockItem) -> Self {
        let raw = Bytes::from(inner.encode_to_vec());
        Self { inner, raw }
    }
}

impl From<Kind> for Item {
    fn from(kind: Kind) -> Self {
        BlockItem { kind: Some(kind) }.into()
    }
}

/// A complete block as received from a block node.
#[derive(Clone, Debug)]
pub struct Block {
    pub items: Vec<Item>,

    /// When the first item of the block arrived.
    pub started: SystemTime,

    /// When the last item of the block arrived.
    pub completed: SystemTime,
}
