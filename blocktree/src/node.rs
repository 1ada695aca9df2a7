//! Tree nodes.

use serde::{Deserialize, Serialize};

use drawtree_crypto::{blake2b_256_multi, hash_node, sign_message, verify_for_account};
use drawtree_ledger::Transaction;
use drawtree_types::{AccountId, KeyPair, NodeHash, Signature, TxId};

use crate::draw::{weighted_value, DrawValue};

/// A proposed extension of the tree for one slot.
///
/// Only the genesis node carries `created_stake`; every other node lists the
/// IDs of the transactions it orders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub seed: u64,
    pub slot: u64,
    pub peer: AccountId,
    /// `peer`'s signature over `(slot, seed)`.
    pub draw: Signature,
    pub created_stake: Vec<Transaction>,
    pub transaction_ids: Vec<TxId>,
    pub parent: NodeHash,
}

/// Bytes signed to produce a draw.
pub fn draw_message(slot: u64, seed: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&slot.to_le_bytes());
    out[8..].copy_from_slice(&seed.to_le_bytes());
    out
}

impl Node {
    pub fn genesis(seed: u64, created_stake: Vec<Transaction>) -> Self {
        Self {
            seed,
            slot: 0,
            peer: AccountId::genesis(),
            draw: Signature::EMPTY,
            created_stake,
            transaction_ids: Vec::new(),
            parent: NodeHash::ZERO,
        }
    }

    /// Build a node for `slot` on top of `parent`, drawing with `keys`.
    pub fn new(
        seed: u64,
        slot: u64,
        transaction_ids: Vec<TxId>,
        keys: &KeyPair,
        parent: &NodeHash,
    ) -> Self {
        Self {
            seed,
            slot,
            peer: keys.account(),
            draw: sign_message(&draw_message(slot, seed), &keys.private),
            created_stake: Vec::new(),
            transaction_ids,
            parent: *parent,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.parent.is_zero() && self.peer.is_genesis()
    }

    /// Canonical encoding; strings and lists are length-prefixed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        fn put_str(out: &mut Vec<u8>, s: &str) {
            out.extend_from_slice(&(s.len() as u64).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }

        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(&self.seed.to_le_bytes());
        out.extend_from_slice(&self.slot.to_le_bytes());
        put_str(&mut out, self.peer.as_str());
        out.extend_from_slice(self.draw.as_bytes());
        out.extend_from_slice(&(self.created_stake.len() as u64).to_le_bytes());
        for tx in &self.created_stake {
            out.extend_from_slice(&tx.signing_bytes());
        }
        out.extend_from_slice(&(self.transaction_ids.len() as u64).to_le_bytes());
        for id in &self.transaction_ids {
            put_str(&mut out, id.as_str());
        }
        out.extend_from_slice(self.parent.as_bytes());
        out
    }

    pub fn hash(&self) -> NodeHash {
        hash_node(&self.canonical_bytes())
    }

    pub fn verify_draw(&self) -> bool {
        verify_for_account(&draw_message(self.slot, self.seed), &self.draw, &self.peer)
    }

    /// Digest of `(slot, seed, draw, peer)`, uniform over 256 bits.
    pub fn draw_digest(&self) -> [u8; 32] {
        blake2b_256_multi(&[
            &self.slot.to_le_bytes(),
            &self.seed.to_le_bytes(),
            self.draw.as_bytes(),
            self.peer.as_str().as_bytes(),
        ])
    }

    pub fn value_of_draw(&self, stake: u64) -> DrawValue {
        weighted_value(&self.draw_digest(), stake)
    }
}
