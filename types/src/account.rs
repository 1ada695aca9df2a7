//! Account identities.
//!
//! An account is named by a self-describing string: either the distinguished
//! `Genesis` identity, which can only mint, or `ed25519:<hex>` carrying the
//! verifying key of the owner. Signatures are checked against the key
//! decoded from the identity itself, so no separate key directory exists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{PublicKey, TypesError};

/// Name of the minting identity used by the genesis node.
pub const GENESIS_ACCOUNT: &str = "Genesis";

/// Prefix of every key-backed identity.
pub const ED25519_PREFIX: &str = "ed25519:";

/// A ledger account identity. Ordered lexicographically on its string form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn genesis() -> Self {
        Self(GENESIS_ACCOUNT.to_string())
    }

    pub fn from_public_key(key: &PublicKey) -> Self {
        Self(format!("{ED25519_PREFIX}{}", key.to_hex()))
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == GENESIS_ACCOUNT
    }

    /// Decode the embedded verifying key. `None` for `Genesis` and for
    /// anything that is not a well-formed `ed25519:` identity.
    pub fn to_public_key(&self) -> Option<PublicKey> {
        let encoded = self.0.strip_prefix(ED25519_PREFIX)?;
        let bytes = hex::decode(encoded).ok()?;
        let key: [u8; 32] = bytes.try_into().ok()?;
        Some(PublicKey(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(ED25519_PREFIX.len() + 8);
        &self.0[..end]
    }
}

impl FromStr for AccountId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Self(s.to_string());
        if id.is_genesis() || id.to_public_key().is_some() {
            Ok(id)
        } else {
            Err(TypesError::InvalidAccount(s.to_string()))
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_roundtrip() {
        let key = PublicKey([0xAB; 32]);
        let id = AccountId::from_public_key(&key);
        assert!(id.as_str().starts_with("ed25519:ab"));
        assert_eq!(id.to_public_key(), Some(key));
    }

    #[test]
    fn genesis_has_no_key() {
        let id = AccountId::genesis();
        assert!(id.is_genesis());
        assert_eq!(id.to_public_key(), None);
        assert_eq!(id.to_string(), "Genesis");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("bob".parse::<AccountId>().is_err());
        assert!("ed25519:zz".parse::<AccountId>().is_err());
        assert!("ed25519:abcd".parse::<AccountId>().is_err());
        assert!("Genesis".parse::<AccountId>().is_ok());
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = AccountId::from_public_key(&PublicKey([0x01; 32]));
        let b = AccountId::from_public_key(&PublicKey([0x02; 32]));
        assert!(a < b);
        assert!(AccountId::genesis() < a);
    }

    #[test]
    fn short_form_is_prefix() {
        let id = AccountId::from_public_key(&PublicKey([0xCD; 32]));
        assert_eq!(id.short(), "ed25519:cdcdcdcd");
        assert_eq!(AccountId::genesis().short(), "Genesis");
    }
}
