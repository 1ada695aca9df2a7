//! Ed25519 message signing and verification.

use drawtree_types::{AccountId, PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign a message with a private key, returning the detached signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Malformed keys verify as `false` rather than erroring.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(message, &dalek_sig).is_ok()
}

/// Verify a signature against the key embedded in an account identity.
///
/// `Genesis` has no key, so nothing ever verifies for it.
pub fn verify_for_account(message: &[u8], signature: &Signature, account: &AccountId) -> bool {
    match account.to_public_key() {
        Some(key) => verify_signature(message, signature, &key),
        None => false,
    }
}
