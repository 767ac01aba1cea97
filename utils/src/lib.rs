//! Leverage common functionality across the block stream primitives.

pub mod serde;
mod time;
pub use time::{Clock, ManualClock, SystemClock, SystemTimeExt};

/// Converts bytes to a hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
