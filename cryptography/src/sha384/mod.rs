//! SHA-384 implementation of the `Hasher` trait.
//!
//! This implementation uses the `sha2` crate to generate SHA-384 digests. SHA-384 is the hash
//! algorithm of the block stream: every leaf, internal node, and block root is a 48-byte SHA-384
//! value.
//!
//! # Example
//! ```rust
//! use blockstream_cryptography::{Hasher, Sha384};
//!
//! // Create a new SHA-384 hasher
//! let mut hasher = Sha384::new();
//!
//! // Update the hasher with some messages
//! hasher.update(b"hello,");
//! hasher.update(b"world!");
//!
//! // Finalize the hasher to get the digest
//! let digest = hasher.finalize();
//!
//! // Print the digest
//! println!("digest: {:?}", digest);
//! ```

use crate::{Error, Hasher};
use blockstream_utils::hex;
use rand::{CryptoRng, RngCore};
use sha2::{Digest as _, Sha384 as ISha384};
use std::{
    fmt::{Debug, Display},
    ops::Deref,
};

const DIGEST_LENGTH: usize = 48;

/// Generate a SHA-384 digest from a message.
pub fn hash(message: &[u8]) -> Digest {
    let mut array = [0u8; DIGEST_LENGTH];
    array.copy_from_slice(&ISha384::digest(message));
    Digest::from(array)
}

/// SHA-384 hasher.
#[derive(Debug)]
pub struct Sha384 {
    hasher: ISha384,
}

impl Default for Sha384 {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Sha384 {
    fn clone(&self) -> Self {
        // We manually implement `Clone` to avoid cloning the hasher state.
        Self::default()
    }
}

impl Hasher for Sha384 {
    type Digest = Digest;

    fn new() -> Self {
        Self {
            hasher: ISha384::new(),
        }
    }

    fn update(&mut self, message: &[u8]) {
        self.hasher.update(message);
    }

    fn finalize(&mut self) -> Self::Digest {
        let mut array = [0u8; DIGEST_LENGTH];
        array.copy_from_slice(&self.hasher.finalize_reset());
        Self::Digest::from(array)
    }

    fn reset(&mut self) {
        self.hasher = ISha384::new();
    }
}

/// Digest of a SHA-384 hashing operation.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl From<[u8; DIGEST_LENGTH]> for Digest {
    fn from(value: [u8; DIGEST_LENGTH]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; DIGEST_LENGTH] =
            value.try_into().map_err(|_| Error::InvalidDigestLength)?;
        Ok(Self(array))
    }
}

impl TryFrom<&Vec<u8>> for Digest {
    type Error = Error;
    fn try_from(value: &Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl TryFrom<Vec<u8>> for Digest {
    type Error = Error;
    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Digest {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl crate::Digest for Digest {
    const SIZE: usize = DIGEST_LENGTH;

    fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut digest = [0u8; DIGEST_LENGTH];
        rng.fill_bytes(&mut digest);
        Self(digest)
    }
}
