use drawtree_ledger::LedgerError;
use drawtree_types::{NodeHash, TxId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("parent {0} is not in the tree")]
    MissingParent(NodeHash),

    #[error("slot {slot} does not follow parent slot {parent_slot}")]
    NonCausalSlot { slot: u64, parent_slot: u64 },

    #[error("seed {got} does not match chain seed {expected}")]
    SeedMismatch { expected: u64, got: u64 },

    #[error("{} referenced transactions are unknown", .0.len())]
    MissingTransactions(Vec<TxId>),

    #[error("node signature is invalid")]
    InvalidSignature,

    #[error("draw does not verify for the signer")]
    InvalidDraw,

    #[error("draw value is below the hardness threshold")]
    BelowHardness,

    #[error("invalid node: {0}")]
    InvalidNode(&'static str),

    #[error("transaction {0} is already delivered")]
    AlreadyDelivered(TxId),

    #[error("transaction rejected: {0}")]
    Rejected(#[from] LedgerError),
}

impl TreeError {
    /// Gaps are recoverable by waiting for more data; everything else is a
    /// verdict on the input itself.
    pub fn is_consistency_gap(&self) -> bool {
        matches!(self, Self::MissingParent(_) | Self::MissingTransactions(_))
    }
}
