use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::{fmt, str::FromStr};

use crate::error::AbiError;

/// Keccak-256 digest of the given bytes.
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&digest);
    arr
}

/// Four-byte function selector: the routing key of a diamond proxy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector([u8; 4]);

impl Selector {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Selector(bytes)
    }

    /// Leading four bytes of the Keccak-256 hash of a canonical signature.
    ///
    /// The input is hashed as-is; callers canonicalize first.
    pub fn of_signature(canonical: &str) -> Self {
        let digest = keccak256(canonical.as_bytes());
        Selector([digest[0], digest[1], digest[2], digest[3]])
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Render as `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex_str(s: &str) -> Result<Self, AbiError> {
        let rest = s.strip_prefix("0x").unwrap_or(s);
        if rest.len() != 8 {
            return Err(AbiError::InvalidLength {
                what: "selector",
                expected: 4,
                actual: rest.len() / 2,
            });
        }
        let mut buf = [0u8; 4];
        hex::decode_to_slice(rest, &mut buf).map_err(|e| AbiError::invalid_hex(s, e))?;
        Ok(Selector(buf))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; 4]> for Selector {
    fn from(value: [u8; 4]) -> Self {
        Selector(value)
    }
}

impl FromStr for Selector {
    type Err = AbiError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::from_hex_str(s)
    }
}

impl Serialize for Selector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Selector::from_hex_str(&s).map_err(serde::de::Error::custom)
    }
}
