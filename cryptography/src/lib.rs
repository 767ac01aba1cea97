//! Hash block stream data with interchangeable digest algorithms.
//!
//! # Status
//!
//! `blockstream-cryptography` is **ALPHA** software. Developers should expect breaking changes and
//! occasional instability.

use rand::{CryptoRng, Rng, RngCore};
use std::{
    fmt::{Debug, Display},
    hash::Hash,
};
use thiserror::Error;

pub mod sha384;
pub use sha384::{hash, Sha384};

/// Errors that can occur when interacting with cryptographic primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid digest length")]
    InvalidDigestLength,
}

/// A fixed-size digest produced by a [Hasher].
///
/// Digests are cheap to copy and render as lowercase hex in both [Debug] and [Display] so they can
/// be dropped straight into log fields and error messages.
pub trait Digest:
    AsRef<[u8]>
    + for<'a> TryFrom<&'a [u8], Error = Error>
    + Copy
    + Eq
    + Ord
    + Hash
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
    /// Length of the digest in bytes.
    const SIZE: usize;

    /// Generate a random [Digest].
    ///
    /// # Warning
    ///
    /// This function is typically used for testing and is not recommended
    /// for production use.
    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self;
}

/// Interface that block stream crates rely on for hashing.
///
/// This trait is required to implement the `Clone` trait because it is often
/// part of a struct that is cloned. In practice, implementations do not actually
/// clone the hasher state but users should not rely on this behavior and call `reset`
/// after cloning.
pub trait Hasher: Clone + Send + Sync + 'static {
    /// Digest generated by the hasher.
    type Digest: Digest;

    /// Create a new hasher.
    fn new() -> Self;

    /// Append message to previously recorded data.
    fn update(&mut self, message: &[u8]);

    /// Hash all recorded data and reset the hasher
    /// to the initial state.
    fn finalize(&mut self) -> Self::Digest;

    /// Reset the hasher without generating a hash.
    ///
    /// This function does not need to be called after `finalize`.
    fn reset(&mut self);

    /// Generate a random digest.
    ///
    /// # Warning
    ///
    /// This function is typically used for testing and is not recommended
    /// for production use.
    fn random<R: Rng + CryptoRng>(rng: &mut R) -> Self::Digest {
        Self::Digest::random(rng)
    }
}
