//! Fundamental types for drawtree.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! account identities, node hashes, transaction IDs, key material, chain
//! parameters and the slot clock.

pub mod account;
pub mod error;
pub mod hash;
pub mod keys;
pub mod params;
pub mod time;
pub mod tx_id;

pub use account::AccountId;
pub use error::TypesError;
pub use hash::NodeHash;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use params::ChainParams;
pub use time::{slot_at, slot_start_millis, Clock, SystemClock};
pub use tx_id::TxId;
