use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::AbiError;

/// 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address; target of Remove cut actions.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Render as `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex_str(s: &str) -> Result<Self, AbiError> {
        let rest = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if rest.len() != 40 {
            return Err(AbiError::InvalidLength {
                what: "address",
                expected: 20,
                actual: rest.len() / 2,
            });
        }
        let mut buf = [0u8; 20];
        hex::decode_to_slice(rest, &mut buf).map_err(|e| AbiError::invalid_hex(s, e))?;
        Ok(Address(buf))
    }

    /// Address occupying the low 20 bytes of an ABI word.
    pub fn from_word(word: &[u8; 32]) -> Result<Self, AbiError> {
        if word[..12].iter().any(|b| *b != 0) {
            return Err(AbiError::Decode(format!(
                "address word has dirty high bytes: 0x{}",
                hex::encode(word)
            )));
        }
        let mut buf = [0u8; 20];
        buf.copy_from_slice(&word[12..]);
        Ok(Address(buf))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; 20]> for Address {
    fn from(value: [u8; 20]) -> Self {
        Address(value)
    }
}

impl FromStr for Address {
    type Err = AbiError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex_str(s)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::from_hex_str(&s).map_err(serde::de::Error::custom)
    }
}
