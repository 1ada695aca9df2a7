//! Transaction pools keyed by ID.

use std::collections::BTreeMap;

use drawtree_types::TxId;

use crate::SignedTransaction;

/// Signed transactions keyed by [`TxId`], iterated in ID order.
#[derive(Clone, Debug, Default)]
pub struct TransactionMap {
    entries: BTreeMap<TxId, SignedTransaction>,
}

impl TransactionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the transaction's own ID. Returns `false` if the ID was
    /// already present (the existing entry is kept).
    pub fn insert(&mut self, tx: SignedTransaction) -> bool {
        let id = tx.id().clone();
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, tx);
        true
    }

    pub fn get(&self, id: &TxId) -> Option<&SignedTransaction> {
        self.entries.get(id)
    }

    pub fn remove(&mut self, id: &TxId) -> Option<SignedTransaction> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TxId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignedTransaction> {
        self.entries.values()
    }

    /// Move every entry into `dest`, leaving `self` empty.
    pub fn transfer_all(&mut self, dest: &mut TransactionMap) {
        dest.entries.append(&mut self.entries);
    }

    /// Move one entry into `dest`. Returns `false` if it was not here.
    pub fn move_to(&mut self, id: &TxId, dest: &mut TransactionMap) -> bool {
        match self.entries.remove(id) {
            Some(tx) => {
                dest.entries.insert(id.clone(), tx);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transaction;
    use drawtree_types::{AccountId, Signature};

    fn tx(index: u64) -> SignedTransaction {
        SignedTransaction {
            transaction: Transaction {
                id: TxId::new(index, "peer"),
                from: AccountId::genesis(),
                to: AccountId::genesis(),
                amount: 1,
            },
            signature: Signature::EMPTY,
        }
    }

    #[test]
    fn insert_get_remove() {
        let mut map = TransactionMap::new();
        assert!(map.insert(tx(1)));
        assert!(!map.insert(tx(1)));
        assert!(map.contains(&TxId::new(1, "peer")));
        assert_eq!(map.len(), 1);
        assert!(map.remove(&TxId::new(1, "peer")).is_some());
        assert!(map.is_empty());
    }

    #[test]
    fn transfer_all_empties_source() {
        let mut received = TransactionMap::new();
        let mut delivered = TransactionMap::new();
        delivered.insert(tx(1));
        delivered.insert(tx(2));
        received.insert(tx(3));
        delivered.transfer_all(&mut received);
        assert!(delivered.is_empty());
        assert_eq!(received.len(), 3);
    }

    #[test]
    fn move_to_is_exclusive() {
        let mut received = TransactionMap::new();
        let mut delivered = TransactionMap::new();
        received.insert(tx(4));
        let id = TxId::new(4, "peer");
        assert!(received.move_to(&id, &mut delivered));
        assert!(!received.contains(&id));
        assert!(delivered.contains(&id));
        assert!(!received.move_to(&id, &mut delivered));
    }
}
