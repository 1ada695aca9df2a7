//! Account ledger and transaction bookkeeping.
//!
//! Balances live in a plain in-memory [`Ledger`] that is rebuilt by replaying
//! tree paths. Every mutation is checked and all-or-nothing. Transactions
//! move between two disjoint pools: `received` (known, not on the best path)
//! and `delivered` (applied on the best path).

pub mod error;
pub mod ledger;
pub mod past;
pub mod pool;
pub mod snapshot;
pub mod transaction;

pub use error::LedgerError;
pub use ledger::Ledger;
pub use past::PastMap;
pub use pool::TransactionMap;
pub use snapshot::{AccountBalance, BalanceCheckpoint, LedgerSnapshot};
pub use transaction::{SignedTransaction, Transaction};
