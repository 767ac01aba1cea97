//! Helpers for (de)serializing configuration values.

use ::serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when parsing a duration string.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration value: {0}")]
    InvalidValue(String),
    #[error("unsupported duration unit: {0}")]
    InvalidUnit(String),
}

/// Parse a human-readable duration such as `250ms`, `5s`, `1m` or `2h`.
///
/// A bare number is interpreted as milliseconds.
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::Empty);
    }
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    let value: u64 = value
        .parse()
        .map_err(|_| Error::InvalidValue(s.to_string()))?;
    match unit.trim() {
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" | "min" => Ok(Duration::from_secs(value.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(value.saturating_mul(3_600))),
        other => Err(Error::InvalidUnit(other.to_string())),
    }
}

/// Deserialize a [Duration] from a human-readable string (see [parse_duration]).
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(::serde::de::Error::custom)
}

/// Serialize a [Duration] as whole seconds when possible, otherwise as milliseconds.
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if duration.subsec_nanos() == 0 {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    } else {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }
}
