//! Wire-format helpers: base64-at-rest SHA-256 and RFC3339 timestamps.
//!
//! Hashes are base64 strings on disk but raw 32-byte arrays in memory, and
//! timestamps are RFC3339 strings with second-or-better precision.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A raw 32-byte SHA-256 digest, serialized as base64 at rest.
pub type Sha256Bytes = [u8; 32];

pub fn serialize<S: Serializer>(bytes: &Sha256Bytes, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Sha256Bytes, D::Error> {
    let encoded = String::deserialize(d)?;
    let decoded = BASE64.decode(&encoded).map_err(serde::de::Error::custom)?;
    decoded
        .try_into()
        .map_err(|v: Vec<u8>| serde::de::Error::custom(format!("expected 32 bytes, got {}", v.len())))
}

/// Encodes a 32-byte SHA-256 digest as base64 (used outside serde contexts,
/// e.g. by the sqlite storage backend's TEXT hash keys).
pub fn encode(bytes: &Sha256Bytes) -> String {
    BASE64.encode(bytes)
}

/// Serializes a `DateTime<Utc>` as RFC3339 with second precision, matching
/// the original tool's `Modified`/`Sealed` fields.
pub mod rfc3339 {
    use super::*;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
