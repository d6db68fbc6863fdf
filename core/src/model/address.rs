//! Ethereum-style addresses and order hashes.
//!
//! Both are fixed-size byte newtypes serialized as `0x`-prefixed hex.
//! The zero address doubles as the mint/burn sentinel in transfer
//! records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// A 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address, used as the mint/burn sentinel.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Creates an address from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true if this is the zero sentinel address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parses a `0x`-prefixed (or bare) hex address.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAddress`] on malformed input.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(stripped).map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte canonical order hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderHash([u8; 32]);

impl OrderHash {
    /// Creates a hash from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses a `0x`-prefixed (or bare) hex hash.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHash`] on malformed input.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| CoreError::InvalidHash(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidHash(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for OrderHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for OrderHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OrderHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An NFT token id.
///
/// Serialized as a decimal string for JSON compatibility with large ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u128);

impl TokenId {
    /// Parses a decimal token id string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAddress`] wrapped input on malformed
    /// input.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        s.parse::<u128>()
            .map(Self)
            .map_err(|_| CoreError::InvalidAddress(format!("token id {s}")))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_zero() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::new([1u8; 20]).is_zero());
    }

    #[test]
    fn test_address_hex_round_trip() {
        let addr = Address::new([0xabu8; 20]);
        let s = addr.to_string();
        assert_eq!(s, format!("0x{}", "ab".repeat(20)));
        assert_eq!(Address::from_hex(&s).ok(), Some(addr));
    }

    #[test]
    fn test_address_from_hex_without_prefix() {
        let s = "ab".repeat(20);
        assert!(Address::from_hex(&s).is_ok());
    }

    #[test]
    fn test_address_from_hex_invalid() {
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("not hex").is_err());
    }

    #[test]
    fn test_order_hash_round_trip() {
        let hash = OrderHash::new([7u8; 32]);
        let s = hash.to_string();
        assert_eq!(OrderHash::from_hex(&s).ok(), Some(hash));
    }

    #[test]
    fn test_order_hash_invalid() {
        assert!(OrderHash::from_hex("0xzz").is_err());
    }

    #[test]
    fn test_token_id_parse() {
        assert_eq!(TokenId::parse("42").ok(), Some(TokenId(42)));
        assert!(TokenId::parse("-1").is_err());
        assert!(TokenId::parse("x").is_err());
    }

    #[test]
    fn test_token_id_serde_as_string() {
        let id = TokenId(123_456_789_012_345_678_901_234_567u128);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"123456789012345678901234567\"");
        let parsed: TokenId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_address_serde() {
        let addr = Address::new([1u8; 20]);
        let json = serde_json::to_string(&addr).expect("serialize");
        let parsed: Address = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, addr);
    }
}
