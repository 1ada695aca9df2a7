//! In-memory account balances.

use std::collections::BTreeMap;
use std::fmt;

use drawtree_types::AccountId;

use crate::snapshot::BalanceCheckpoint;
use crate::{LedgerError, Transaction};

/// Account balances. Unknown accounts hold zero.
///
/// `Clone` is the deep copy used for speculative checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    balances: BTreeMap<AccountId, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Number of accounts that have ever been touched.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn total_supply(&self) -> u128 {
        self.balances.values().map(|b| *b as u128).sum()
    }

    /// Apply a transfer with no fee.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        self.apply_with_fee(tx, 0).map(|_| ())
    }

    /// Apply a transfer: the sender is debited `amount`, the receiver credited
    /// `amount - fee`. Returns the fee the caller must pay out.
    ///
    /// A `Genesis` sender mints: the receiver is credited the full amount and
    /// no fee is collected. Nothing changes when an error is returned.
    pub fn apply_with_fee(&mut self, tx: &Transaction, fee: u64) -> Result<u64, LedgerError> {
        if tx.amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        if tx.from.is_genesis() {
            self.add_to_balance(&tx.to, tx.amount)?;
            return Ok(0);
        }

        if tx.amount < fee {
            return Err(LedgerError::FeeExceedsAmount {
                amount: tx.amount,
                fee,
            });
        }

        let available = self.balance(&tx.from);
        let sender_after = available
            .checked_sub(tx.amount)
            .ok_or_else(|| LedgerError::Overdraft {
                account: tx.from.clone(),
                available,
                needed: tx.amount,
            })?;

        let receiver_before = if tx.to == tx.from {
            sender_after
        } else {
            self.balance(&tx.to)
        };
        let receiver_after = receiver_before
            .checked_add(tx.amount - fee)
            .ok_or_else(|| LedgerError::Overflow(tx.to.clone()))?;

        self.balances.insert(tx.from.clone(), sender_after);
        self.balances.insert(tx.to.clone(), receiver_after);
        Ok(fee)
    }

    /// Read-only: true iff applying `tx` would not overdraw the sender.
    pub fn check_balance(&self, tx: &Transaction) -> bool {
        tx.from.is_genesis() || self.balance(&tx.from) >= tx.amount
    }

    /// Unconditional credit for mints, rewards and fees.
    pub fn add_to_balance(&mut self, account: &AccountId, amount: u64) -> Result<(), LedgerError> {
        let updated = self
            .balance(account)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(account.clone()))?;
        self.balances.insert(account.clone(), updated);
        Ok(())
    }

    /// Accounts ordered by balance descending, then identity ascending.
    pub fn sorted_keys(&self) -> Vec<AccountId> {
        let mut entries: Vec<(&AccountId, &u64)> = self.balances.iter().collect();
        entries.sort_by(|(a_id, a_bal), (b_id, b_bal)| b_bal.cmp(a_bal).then_with(|| a_id.cmp(b_id)));
        entries.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Balances in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, u64)> {
        self.balances.iter().map(|(id, bal)| (id, *bal))
    }

    /// Record the current entries of `accounts` so they can be restored later.
    pub fn capture<'a>(&self, accounts: impl IntoIterator<Item = &'a AccountId>) -> BalanceCheckpoint {
        let mut checkpoint = BalanceCheckpoint::default();
        for account in accounts {
            checkpoint.record(account.clone(), self.balances.get(account).copied());
        }
        checkpoint
    }

    /// Put the captured accounts back exactly as they were, including
    /// forgetting accounts that did not exist yet.
    pub fn restore(&mut self, checkpoint: &BalanceCheckpoint) {
        for (account, previous) in checkpoint.entries() {
            match previous {
                Some(balance) => {
                    self.balances.insert(account.clone(), *balance);
                }
                None => {
                    self.balances.remove(account);
                }
            }
        }
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for account in self.sorted_keys() {
            writeln!(f, "{:>12} {}", self.balance(&account), account)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawtree_types::{PublicKey, TxId};

    fn account(n: u8) -> AccountId {
        AccountId::from_public_key(&PublicKey([n; 32]))
    }

    fn transfer(from: &AccountId, to: &AccountId, amount: u64) -> Transaction {
        Transaction {
            id: TxId::new(0, "test"),
            from: from.clone(),
            to: to.clone(),
            amount,
        }
    }

    fn funded(holder: &AccountId, amount: u64) -> Ledger {
        let mut ledger = Ledger::new();
        ledger.add_to_balance(holder, amount).unwrap();
        ledger
    }

    #[test]
    fn apply_moves_funds() {
        let (a, b) = (account(1), account(2));
        let mut ledger = funded(&a, 100);
        ledger.apply(&transfer(&a, &b, 40)).unwrap();
        assert_eq!(ledger.balance(&a), 60);
        assert_eq!(ledger.balance(&b), 40);
    }

    #[test]
    fn overdraft_is_rejected_without_mutation() {
        let (a, b) = (account(1), account(2));
        let mut ledger = funded(&a, 10);
        let before = ledger.clone();
        let err = ledger.apply(&transfer(&a, &b, 11)).unwrap_err();
        assert!(matches!(err, LedgerError::Overdraft { available: 10, needed: 11, .. }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn unknown_sender_has_nothing() {
        let mut ledger = Ledger::new();
        assert!(ledger.apply(&transfer(&account(1), &account(2), 1)).is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn zero_amount_rejected() {
        let a = account(1);
        let mut ledger = funded(&a, 10);
        assert_eq!(
            ledger.apply(&transfer(&a, &account(2), 0)),
            Err(LedgerError::ZeroAmount)
        );
    }

    #[test]
    fn genesis_mints() {
        let a = account(1);
        let mut ledger = Ledger::new();
        let fee = ledger
            .apply_with_fee(&transfer(&AccountId::genesis(), &a, 1_000), 1)
            .unwrap();
        assert_eq!(fee, 0);
        assert_eq!(ledger.balance(&a), 1_000);
        assert_eq!(ledger.balance(&AccountId::genesis()), 0);
    }

    #[test]
    fn fee_is_withheld_from_receiver() {
        let (a, b) = (account(1), account(2));
        let mut ledger = funded(&a, 1_000);
        let fee = ledger.apply_with_fee(&transfer(&a, &b, 100), 1).unwrap();
        assert_eq!(fee, 1);
        assert_eq!(ledger.balance(&a), 900);
        assert_eq!(ledger.balance(&b), 99);
        assert_eq!(ledger.total_supply(), 999);
    }

    #[test]
    fn fee_larger_than_amount_rejected() {
        let (a, b) = (account(1), account(2));
        let mut ledger = funded(&a, 10);
        assert_eq!(
            ledger.apply_with_fee(&transfer(&a, &b, 1), 2),
            Err(LedgerError::FeeExceedsAmount { amount: 1, fee: 2 })
        );
        assert_eq!(ledger.balance(&a), 10);
    }

    #[test]
    fn self_transfer_only_pays_fee() {
        let a = account(1);
        let mut ledger = funded(&a, 50);
        ledger.apply_with_fee(&transfer(&a, &a, 20), 1).unwrap();
        assert_eq!(ledger.balance(&a), 49);
    }

    #[test]
    fn receiver_overflow_rejected() {
        let (a, b) = (account(1), account(2));
        let mut ledger = funded(&a, 10);
        ledger.add_to_balance(&b, u64::MAX).unwrap();
        let before = ledger.clone();
        assert_eq!(
            ledger.apply(&transfer(&a, &b, 5)),
            Err(LedgerError::Overflow(b.clone()))
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn check_balance_matches_apply() {
        let (a, b) = (account(1), account(2));
        let ledger = funded(&a, 10);
        assert!(ledger.check_balance(&transfer(&a, &b, 10)));
        assert!(!ledger.check_balance(&transfer(&a, &b, 11)));
        assert!(ledger.check_balance(&transfer(&AccountId::genesis(), &b, u64::MAX)));
    }

    #[test]
    fn copy_is_independent() {
        let (a, b) = (account(1), account(2));
        let ledger = funded(&a, 10);
        let mut copy = ledger.clone();
        copy.apply(&transfer(&a, &b, 10)).unwrap();
        assert_eq!(ledger.balance(&a), 10);
        assert_eq!(copy.balance(&a), 0);
    }

    #[test]
    fn sorted_keys_by_balance_then_identity() {
        let (a, b, c) = (account(1), account(2), account(3));
        let mut ledger = Ledger::new();
        ledger.add_to_balance(&c, 5).unwrap();
        ledger.add_to_balance(&b, 7).unwrap();
        ledger.add_to_balance(&a, 5).unwrap();
        assert_eq!(ledger.sorted_keys(), vec![b, a, c]);
    }

    #[test]
    fn capture_and_restore_forgets_new_accounts() {
        let (a, b) = (account(1), account(2));
        let mut ledger = funded(&a, 10);
        let before = ledger.clone();
        let checkpoint = ledger.capture([&a, &b]);
        ledger.apply(&transfer(&a, &b, 4)).unwrap();
        ledger.restore(&checkpoint);
        assert_eq!(ledger, before);
        assert_eq!(ledger.len(), 1);
    }
}
