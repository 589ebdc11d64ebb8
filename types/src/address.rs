//! Keeper address type, always stored lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypeError;

/// The on-chain address identifying a keeper.
///
/// Constructed only through [`KeeperAddress::parse`], which trims and
/// lowercases the input, so two spellings of the same hex address always
/// compare equal and hash to the same registry slot.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeeperAddress(String);

impl KeeperAddress {
    /// Normalize a raw address string.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// Return the raw (lowercase) address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeeperAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for KeeperAddress {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<KeeperAddress> for String {
    fn from(address: KeeperAddress) -> Self {
        address.0
    }
}

impl AsRef<str> for KeeperAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
