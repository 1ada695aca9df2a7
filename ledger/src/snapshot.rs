//! Balance checkpoints for rollback, and hashed snapshots for comparing
//! replicas.
//!
//! A [`BalanceCheckpoint`] records the prior entries of the accounts a tree
//! node is about to touch; restoring it undoes that node exactly. A
//! [`LedgerSnapshot`] captures every balance at a given head, with a
//! deterministic Blake2b hash so two peers can check they agree.

use serde::{Deserialize, Serialize};

use drawtree_types::{AccountId, NodeHash};

use crate::Ledger;

/// Prior balances of a set of accounts. `None` means the account did not
/// exist yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceCheckpoint {
    entries: Vec<(AccountId, Option<u64>)>,
}

impl BalanceCheckpoint {
    /// Record an account's prior balance. The first record wins.
    pub fn record(&mut self, account: AccountId, previous: Option<u64>) {
        if !self.entries.iter().any(|(a, _)| *a == account) {
            self.entries.push((account, previous));
        }
    }

    pub fn entries(&self) -> &[(AccountId, Option<u64>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One account's balance inside a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: AccountId,
    pub balance: u64,
}

/// Every balance at a given head.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Blake2b of head, depth and balances.
    pub hash: [u8; 32],
    pub head: NodeHash,
    pub depth: u64,
    /// Ordered by identity.
    pub accounts: Vec<AccountBalance>,
}

impl LedgerSnapshot {
    pub fn capture(ledger: &Ledger, head: NodeHash, depth: u64) -> Self {
        let accounts = ledger
            .iter()
            .map(|(account, balance)| AccountBalance {
                account: account.clone(),
                balance,
            })
            .collect();
        let mut snap = Self {
            hash: [0u8; 32],
            head,
            depth,
            accounts,
        };
        snap.hash = snap.compute_hash();
        snap
    }

    fn compute_hash(&self) -> [u8; 32] {
        use blake2::digest::consts::U32;
        use blake2::{Blake2b, Digest};

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.head.as_bytes());
        hasher.update(self.depth.to_le_bytes());
        for entry in &self.accounts {
            let name = entry.account.as_str().as_bytes();
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name);
            hasher.update(entry.balance.to_le_bytes());
        }

        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Rebuild the ledger this snapshot was taken from.
    pub fn to_ledger(&self) -> Result<Ledger, crate::LedgerError> {
        let mut ledger = Ledger::new();
        for entry in &self.accounts {
            ledger.add_to_balance(&entry.account, entry.balance)?;
        }
        Ok(ledger)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn total_supply(&self) -> u128 {
        self.accounts.iter().map(|a| a.balance as u128).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawtree_types::PublicKey;

    fn sample_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .add_to_balance(&AccountId::from_public_key(&PublicKey([1; 32])), 900)
            .unwrap();
        ledger
            .add_to_balance(&AccountId::from_public_key(&PublicKey([2; 32])), 99)
            .unwrap();
        ledger
    }

    #[test]
    fn capture_and_verify() {
        let snap = LedgerSnapshot::capture(&sample_ledger(), NodeHash::new([7; 32]), 3);
        assert!(snap.verify());
        assert_eq!(snap.total_supply(), 999);
        assert_eq!(snap.accounts.len(), 2);
    }

    #[test]
    fn tampered_balance_fails_verify() {
        let mut snap = LedgerSnapshot::capture(&sample_ledger(), NodeHash::ZERO, 1);
        snap.accounts[0].balance += 1;
        assert!(!snap.verify());
    }

    #[test]
    fn equal_ledgers_hash_equal() {
        let a = LedgerSnapshot::capture(&sample_ledger(), NodeHash::ZERO, 1);
        let b = LedgerSnapshot::capture(&sample_ledger(), NodeHash::ZERO, 1);
        assert_eq!(a.hash, b.hash);
        let c = LedgerSnapshot::capture(&sample_ledger(), NodeHash::ZERO, 2);
        assert_ne!(a.hash, c.hash);
    }

    #[test]
    fn bytes_roundtrip_rebuilds_ledger() {
        let ledger = sample_ledger();
        let snap = LedgerSnapshot::capture(&ledger, NodeHash::ZERO, 0);
        let restored = LedgerSnapshot::from_bytes(&snap.to_bytes().unwrap()).unwrap();
        assert!(restored.verify());
        assert_eq!(restored.to_ledger().unwrap(), ledger);
    }

    #[test]
    fn checkpoint_keeps_first_record() {
        let id = AccountId::genesis();
        let mut checkpoint = BalanceCheckpoint::default();
        checkpoint.record(id.clone(), Some(5));
        checkpoint.record(id, Some(9));
        assert_eq!(checkpoint.len(), 1);
        assert_eq!(checkpoint.entries()[0].1, Some(5));
    }
}
