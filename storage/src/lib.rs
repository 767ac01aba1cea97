//! Authenticate block stream data with append-only Merkle structures.
//!
//! # Status
//!
//! `blockstream-storage` is **ALPHA** software. Developers should expect breaking changes and
//! occasional instability.

pub mod merkle;
