//! Transfers and their signed envelope.

use serde::{Deserialize, Serialize};

use drawtree_crypto::{sign_message, verify_for_account};
use drawtree_types::{AccountId, PrivateKey, Signature, TxId};

/// A transfer of `amount` units from `from` to `to`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: u64,
}

impl Transaction {
    /// Canonical bytes covered by the sender's signature.
    ///
    /// Each string is length-prefixed so no two distinct transactions share
    /// an encoding.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            32 + self.id.as_str().len() + self.from.as_str().len() + self.to.as_str().len(),
        );
        for part in [self.id.as_str(), self.from.as_str(), self.to.as_str()] {
            out.extend_from_slice(&(part.len() as u64).to_le_bytes());
            out.extend_from_slice(part.as_bytes());
        }
        out.extend_from_slice(&self.amount.to_le_bytes());
        out
    }
}

/// A transaction plus the sender's detached signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
}

impl SignedTransaction {
    pub fn sign(transaction: Transaction, private_key: &PrivateKey) -> Self {
        let signature = sign_message(&transaction.signing_bytes(), private_key);
        Self {
            transaction,
            signature,
        }
    }

    /// Whether the signature verifies against the key embedded in `from`.
    pub fn verify(&self) -> bool {
        verify_for_account(
            &self.transaction.signing_bytes(),
            &self.signature,
            &self.transaction.from,
        )
    }

    /// Acceptable network input: a valid signature and a positive amount.
    pub fn is_valid(&self) -> bool {
        self.transaction.amount > 0 && self.verify()
    }

    pub fn id(&self) -> &TxId {
        &self.transaction.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawtree_crypto::keypair_from_seed;

    fn signed(amount: u64) -> SignedTransaction {
        let alice = keypair_from_seed(&[1u8; 32]);
        let bob = keypair_from_seed(&[2u8; 32]);
        let tx = Transaction {
            id: TxId::new(0, "127.0.0.1:5000"),
            from: alice.account(),
            to: bob.account(),
            amount,
        };
        SignedTransaction::sign(tx, &alice.private)
    }

    #[test]
    fn signed_transaction_verifies() {
        let stx = signed(100);
        assert!(stx.verify());
        assert!(stx.is_valid());
    }

    #[test]
    fn tampered_amount_fails() {
        let mut stx = signed(100);
        stx.transaction.amount = 1_000;
        assert!(!stx.verify());
    }

    #[test]
    fn tampered_receiver_fails() {
        let mut stx = signed(100);
        stx.transaction.to = keypair_from_seed(&[3u8; 32]).account();
        assert!(!stx.verify());
    }

    #[test]
    fn zero_amount_is_not_valid_input() {
        let stx = signed(0);
        assert!(stx.verify());
        assert!(!stx.is_valid());
    }

    #[test]
    fn signature_by_other_key_fails() {
        let mallory = keypair_from_seed(&[9u8; 32]);
        let mut stx = signed(5);
        stx.signature = sign_message(&stx.transaction.signing_bytes(), &mallory.private);
        assert!(!stx.verify());
    }

    #[test]
    fn genesis_sender_never_verifies() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let tx = Transaction {
            id: TxId::new(0, "x"),
            from: AccountId::genesis(),
            to: alice.account(),
            amount: 10,
        };
        assert!(!SignedTransaction::sign(tx, &alice.private).verify());
    }

    #[test]
    fn signing_bytes_separate_fields() {
        let a = Transaction {
            id: TxId::new(1, "ab"),
            from: AccountId::genesis(),
            to: AccountId::genesis(),
            amount: 1,
        };
        let mut b = a.clone();
        b.id = TxId::new(1, "a");
        assert_ne!(a.signing_bytes(), b.signing_bytes());
    }
}
