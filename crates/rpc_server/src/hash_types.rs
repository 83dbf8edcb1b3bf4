//! Fixed-size hash types used throughout the RPC surface.
//!
//! Mirrors the shape of `neo_core::{UInt160, UInt256}`: little-endian byte
//! storage, big-endian `0x`-prefixed hex display (matching Neo's own
//! convention of printing hashes reversed from their wire order).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("invalid hash string: {0}")]
pub struct ParseHashError(pub String);

macro_rules! fixed_hash {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn zero() -> Self {
                Self([0u8; $len])
            }

            pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseHashError> {
                if bytes.len() != $len {
                    return Err(ParseHashError(format!(
                        "expected {} bytes, got {}",
                        $len,
                        bytes.len()
                    )));
                }
                let mut out = [0u8; $len];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn parse(text: &str) -> Result<Self, ParseHashError> {
                text.parse()
            }
        }

        impl FromStr for $name {
            type Err = ParseHashError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
                if hex_part.len() != $len * 2 {
                    return Err(ParseHashError(format!("wrong length: {}", trimmed)));
                }
                let mut bytes = hex::decode(hex_part)
                    .map_err(|_| ParseHashError(format!("invalid hex: {}", trimmed)))?;
                // Displayed big-endian, stored little-endian.
                bytes.reverse();
                Self::from_bytes(&bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut reversed = self.0;
                reversed.reverse();
                write!(f, "0x{}", hex::encode(reversed))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_hash!(UInt160, 20);
fixed_hash!(UInt256, 32);
