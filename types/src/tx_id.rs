//! Transaction identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// `"<local-index>-<peer-address>"`. Unique as long as every peer address has
/// a single writer assigning indices.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub fn new(index: u64, address: &str) -> Self {
        Self(format!("{index}-{address}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The local index part, if the ID follows the `<index>-<address>` shape.
    pub fn index(&self) -> Option<u64> {
        self.0.split_once('-')?.0.parse().ok()
    }
}

impl FromStr for TxId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TypesError::InvalidTxId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_index() {
        let id = TxId::new(7, "127.0.0.1:4000");
        assert_eq!(id.as_str(), "7-127.0.0.1:4000");
        assert_eq!(id.index(), Some(7));
    }

    #[test]
    fn empty_id_rejected() {
        assert!("".parse::<TxId>().is_err());
        assert_eq!("genesis-0".parse::<TxId>().unwrap().index(), None);
    }
}
