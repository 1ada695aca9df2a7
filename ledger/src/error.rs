use drawtree_types::AccountId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("overdraft: {account} holds {available}, needs {needed}")]
    Overdraft {
        account: AccountId,
        available: u64,
        needed: u64,
    },

    #[error("transaction amount must be positive")]
    ZeroAmount,

    #[error("amount {amount} does not cover the fee {fee}")]
    FeeExceedsAmount { amount: u64, fee: u64 },

    #[error("balance overflow for {0}")]
    Overflow(AccountId),
}
