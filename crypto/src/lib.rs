//! Cryptographic primitives for drawtree.
//!
//! - **Ed25519** for transaction, node and draw signatures
//! - **Blake2b-256** for node hashes, draw digests and snapshot hashes

pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi, hash_node};
pub use keys::{
    generate_keypair, keypair_from_hex, keypair_from_private, keypair_from_seed,
    private_key_hex, public_from_private,
};
pub use sign::{sign_message, verify_for_account, verify_signature};
