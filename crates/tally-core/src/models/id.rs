//! Record identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::Error;

const COUNTER_MASK: u32 = 0x00ff_ffff;

/// A 12-byte object id rendered as 24 lowercase hex characters.
///
/// Layout: 4-byte big-endian unix seconds, 5 bytes of per-process randomness,
/// and a 3-byte counter. Ids created in a later second always sort after ids
/// created in an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId([u8; 12]);

impl RecordId {
    /// Create a new unique record ID
    #[must_use]
    pub fn new() -> Self {
        let seconds = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
        let counter = next_counter().to_be_bytes();

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(process_unique());
        bytes[9..].copy_from_slice(&counter[1..]);
        Self(bytes)
    }

    /// Get the 24-char string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.to_string()
    }

    /// Seconds component embedded in the id.
    #[must_use]
    pub const fn timestamp_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 24 || !s.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!(
                "Record id must be 24 hex characters: {s}"
            )));
        }

        let mut bytes = [0u8; 12];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let pair = &s[index * 2..index * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| Error::InvalidInput(format!("Invalid record id: {s}")))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.to_string()
    }
}

fn process_unique() -> &'static [u8; 5] {
    static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
    PROCESS_UNIQUE.get_or_init(|| {
        let seed = Uuid::now_v7();
        let random = &seed.as_bytes()[11..16];
        [random[0], random[1], random[2], random[3], random[4]]
    })
}

fn next_counter() -> u32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| {
        let seed = Uuid::now_v7();
        let bytes = seed.as_bytes();
        AtomicU32::new(u32::from_be_bytes([0, bytes[8], bytes[9], bytes[10]]))
    });
    counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_unique() {
        let id1 = RecordId::new();
        let id2 = RecordId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_id_is_24_hex_chars() {
        let id = RecordId::new().as_str();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
    }

    #[test]
    fn test_record_id_parse() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_record_id_rejects_malformed() {
        assert!("".parse::<RecordId>().is_err());
        assert!("65f1c0ffee".parse::<RecordId>().is_err());
        assert!("zzzzzzzzzzzzzzzzzzzzzzzz".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_record_id_embeds_creation_second() {
        let before = u32::try_from(chrono::Utc::now().timestamp()).unwrap();
        let id = RecordId::new();
        assert!(id.timestamp_secs() >= before);
    }

    #[test]
    fn test_record_id_serde_as_string() {
        let id: RecordId = "65f1c0ffee00112233445566".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"65f1c0ffee00112233445566\"");
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
