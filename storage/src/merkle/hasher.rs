//! Decorator for a cryptographic hasher that implements the domain-separated Merkle hashing logic.

use super::Error;
use blockstream_cryptography::Hasher as CHasher;

/// Prefix of a leaf hash.
pub const LEAF_PREFIX: u8 = 0x00;

/// Prefix of an internal node with a single child.
pub const SINGLE_CHILD_PREFIX: u8 = 0x01;

/// Prefix of an internal node with two children.
pub const NODE_PREFIX: u8 = 0x02;

/// The standard hasher to use with a Merkle tree for computing leaf and internal node digests.
///
/// The wrapped hasher is reused across calls (every digest resets it).
#[derive(Clone, Debug, Default)]
pub struct Standard<H: CHasher> {
    hasher: H,
}

impl<H: CHasher> Standard<H> {
    /// Creates a new [Standard] hasher.
    pub fn new() -> Self {
        Self { hasher: H::new() }
    }

    /// Computes the digest of a leaf holding `data`.
    pub fn leaf_digest(&mut self, data: &[u8]) -> H::Digest {
        self.hasher.update(&[LEAF_PREFIX]);
        self.hasher.update(data);
        self.hasher.finalize()
    }

    /// Computes the digest of an internal node whose only child is `child`.
    pub fn single_digest(&mut self, child: &H::Digest) -> H::Digest {
        self.hasher.update(&[SINGLE_CHILD_PREFIX]);
        self.hasher.update(child.as_ref());
        self.hasher.finalize()
    }

    /// Computes the digest of an internal node given the digests of its children.
    pub fn node_digest(&mut self, left: &H::Digest, right: &H::Digest) -> H::Digest {
        self.hasher.update(&[NODE_PREFIX]);
        self.hasher.update(left.as_ref());
        self.hasher.update(right.as_ref());
        self.hasher.finalize()
    }

    /// Computes the digest of an internal node with an arbitrary number of children, dispatching
    /// to [Self::single_digest] or [Self::node_digest].
    ///
    /// Any count other than one or two is rejected.
    pub fn internal_digest(&mut self, children: &[&H::Digest]) -> Result<H::Digest, Error> {
        match children {
            [child] => Ok(self.single_digest(child)),
            [left, right] => Ok(self.node_digest(left, right)),
            _ => Err(Error::InvalidChildCount(children.len())),
        }
    }

    /// Folds a perfect layer of `leaves` pairwise into a single root.
    ///
    /// The provided digests are used as-is (they are not re-hashed as leaves). The number of
    /// digests must be a non-zero power of two.
    pub fn combine(&mut self, leaves: &[H::Digest]) -> Result<H::Digest, Error> {
        if !leaves.len().is_power_of_two() {
            return Err(Error::InvalidLeafCount(leaves.len()));
        }

        let mut layer = leaves.to_vec();
        while layer.len() > 1 {
            layer = layer
                .chunks_exact(2)
                .map(|pair| self.node_digest(&pair[0], &pair[1]))
                .collect();
        }
        Ok(layer[0])
    }

    /// Computes the plain digest of `data` (no prefix).
    pub fn digest(&mut self, data: &[u8]) -> H::Digest {
        self.hasher.update(data);
        self.hasher.finalize()
    }

    /// Access the inner [CHasher] hasher.
    pub fn inner(&mut self) -> &mut H {
        &mut self.hasher
    }
}
