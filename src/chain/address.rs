//! Algorand account addresses.
//!
//! An address is the RFC 4648 base32 encoding (no padding) of the 32-byte
//! Ed25519 public key followed by the last four bytes of its SHA-512/256
//! digest, giving a 58-character upper-case string.

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of the address checksum in bytes.
const CHECKSUM_LEN: usize = 4;

/// Length of an encoded address string.
pub const ADDRESS_LEN: usize = 58;

/// Errors decoding an address string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The string is not 58 characters long.
    #[error("address must be {ADDRESS_LEN} characters, got {0}")]
    InvalidLength(usize),

    /// The string is not valid upper-case base32.
    #[error("address is not valid base32")]
    InvalidEncoding,

    /// The trailing checksum does not match the public key.
    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

/// A validated Algorand address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; PUBLIC_KEY_LEN]);

impl Address {
    /// Builds an address from a raw public key.
    #[must_use]
    pub const fn from_public_key(public_key: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(public_key)
    }

    /// Builds an address from a byte slice, which must be exactly 32 bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; PUBLIC_KEY_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Returns the raw public key.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Encodes the address in its canonical 58-character form.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut buf = Vec::with_capacity(PUBLIC_KEY_LEN + CHECKSUM_LEN);
        buf.extend_from_slice(&self.0);
        buf.extend_from_slice(&checksum(&self.0));
        BASE32_NOPAD.encode(&buf)
    }

    /// Returns `true` if `s` is a well-formed address with a valid checksum.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        s.parse::<Self>().is_ok()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ADDRESS_LEN {
            return Err(AddressError::InvalidLength(s.len()));
        }
        let decoded = BASE32_NOPAD
            .decode(s.as_bytes())
            .map_err(|_| AddressError::InvalidEncoding)?;
        let (key, sum) = decoded
            .split_at_checked(PUBLIC_KEY_LEN)
            .ok_or(AddressError::InvalidEncoding)?;
        let address = Self::from_slice(key).ok_or(AddressError::InvalidEncoding)?;
        if sum != checksum(address.public_key()).as_slice() {
            return Err(AddressError::ChecksumMismatch);
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn checksum(public_key: &[u8; PUBLIC_KEY_LEN]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha512_256::digest(public_key);
    let mut out = [0u8; CHECKSUM_LEN];
    if let Some(tail) = digest.get(digest.len() - CHECKSUM_LEN..) {
        out.copy_from_slice(tail);
    }
    out
}
