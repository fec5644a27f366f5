//! Account and extension addresses.
//!
//! # Responsibility
//! - Provide one fixed-width identity for accounts, extensions and cores.
//! - Keep textual form (`0x` + 40 lowercase hex digits) stable for storage.
//!
//! # Invariants
//! - `Address::ZERO` is the null account and never holds code or tokens.
//! - Parsing accepts either hex case but always renders lowercase.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Byte width of one address.
pub const ADDRESS_LEN: usize = 20;

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex"));

/// 20-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Null account; minting is a transfer from it, burning a transfer to it.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Derives a deterministic address from a human-readable label.
    ///
    /// Used by fixtures and the CLI demo; the same label always yields the
    /// same address.
    pub fn derive(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[..ADDRESS_LEN]);
        Self(bytes)
    }

    /// Parses `0x`-prefixed hex text.
    pub fn parse(value: &str) -> Result<Self, AddressParseError> {
        let trimmed = value.trim();
        if !ADDRESS_RE.is_match(trimmed) {
            return Err(AddressParseError(trimmed.to_string()));
        }
        let decoded =
            hex::decode(&trimmed[2..]).map_err(|_| AddressParseError(trimmed.to_string()))?;
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

/// Textual address did not match `0x` + 40 hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError(pub String);

impl Display for AddressParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "address is invalid: {}", self.0)
    }
}

impl Error for AddressParseError {}
