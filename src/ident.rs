// SPDX-License-Identifier: Apache-2.0 OR MIT
// Fixed-width identifiers for ECU, application and context ids

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};

/// A DLT identifier: exactly 4 bytes, zero-padded, truncated on construction.
///
/// Used for ECU ids, application ids and context ids. Hashing uses the raw
/// 4-byte word so identifiers are cheap map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoggingIdentifier {
    data: [u8; 4],
}

impl LoggingIdentifier {
    /// Construct from a string, truncating to 4 bytes and zero-padding
    pub fn new(identifier: &str) -> Self {
        let bytes = identifier.as_bytes();
        let len = bytes.len().min(4);
        let mut data = [0u8; 4];
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// The raw 4-byte representation (zero padded)
    #[inline]
    pub const fn bytes(&self) -> [u8; 4] {
        self.data
    }

    /// The identifier as a string slice, without trailing padding
    pub fn as_str(&self) -> &str {
        let len = self.data.iter().position(|&b| b == 0).unwrap_or(4);
        std::str::from_utf8(&self.data[..len]).unwrap_or("")
    }
}

impl Hash for LoggingIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(u32::from_ne_bytes(self.data));
    }
}

impl std::fmt::Display for LoggingIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for LoggingIdentifier {
    fn from(identifier: &str) -> Self {
        Self::new(identifier)
    }
}

impl Serialize for LoggingIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LoggingIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    #[test]
    fn test_exact_four_bytes() {
        let id = LoggingIdentifier::new("APP1");
        assert_eq!(id.bytes(), *b"APP1");
        assert_eq!(id.as_str(), "APP1");
    }

    #[test]
    fn test_truncation() {
        let id = LoggingIdentifier::new("LONGNAME");
        assert_eq!(id.bytes(), *b"LONG");
        assert_eq!(id.as_str(), "LONG");
    }

    #[test]
    fn test_zero_padding() {
        let id = LoggingIdentifier::new("AB");
        assert_eq!(id.bytes(), [b'A', b'B', 0, 0]);
        assert_eq!(id.as_str(), "AB");
    }

    #[test]
    fn test_empty() {
        let id = LoggingIdentifier::new("");
        assert_eq!(id.bytes(), [0; 4]);
        assert_eq!(id.as_str(), "");
    }

    #[test]
    fn test_truncated_names_collide() {
        // Long names map to their 4-byte prefix, so lookups must go through
        // the same truncation.
        assert_eq!(
            LoggingIdentifier::new("CONTEXT_A"),
            LoggingIdentifier::new("CONT")
        );
    }

    #[test]
    fn test_hash_is_raw_word() {
        let mut a = DefaultHasher::new();
        LoggingIdentifier::new("CTX1").hash(&mut a);
        let mut b = DefaultHasher::new();
        b.write_u32(u32::from_ne_bytes(*b"CTX1"));
        assert_eq!(a.finish(), b.finish());
    }
}
