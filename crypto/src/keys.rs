//! Ed25519 key generation and seed encoding.

use drawtree_types::{KeyPair, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;
use zeroize::Zeroize;

use crate::CryptoError;

/// Generate a new key pair from the operating system's randomness source.
pub fn generate_keypair() -> Result<KeyPair, CryptoError> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| CryptoError::Randomness(e.to_string()))?;
    let kp = keypair_from_seed(&seed);
    seed.zeroize();
    Ok(kp)
}

pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    PublicKey(SigningKey::from_bytes(&private.0).verifying_key().to_bytes())
}

pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_from_private(PrivateKey(*seed))
}

/// Parse a key pair from the hex encoding of its 32-byte seed.
pub fn keypair_from_hex(encoded: &str) -> Result<KeyPair, CryptoError> {
    let mut bytes =
        hex::decode(encoded.trim()).map_err(|e| CryptoError::InvalidSeed(e.to_string()))?;
    let seed: Result<[u8; 32], _> = bytes.as_slice().try_into();
    let len = bytes.len();
    bytes.zeroize();
    let mut seed =
        seed.map_err(|_| CryptoError::InvalidSeed(format!("expected 32 bytes, got {len}")))?;
    let kp = keypair_from_seed(&seed);
    seed.zeroize();
    Ok(kp)
}

/// Hex encoding of the secret seed, as stored in key files.
pub fn private_key_hex(private: &PrivateKey) -> String {
    hex::encode(private.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_keys() {
        let kp1 = generate_keypair().unwrap();
        let kp2 = generate_keypair().unwrap();
        assert_ne!(kp1.public, kp2.public);
    }

    #[test]
    fn public_from_private_is_deterministic() {
        let kp = keypair_from_seed(&[8u8; 32]);
        assert_eq!(public_from_private(&kp.private), kp.public);
    }

    #[test]
    fn hex_seed_roundtrip() {
        let kp = keypair_from_seed(&[42u8; 32]);
        let encoded = private_key_hex(&kp.private);
        let restored = keypair_from_hex(&format!("{encoded}\n")).unwrap();
        assert_eq!(restored.public, kp.public);
    }

    #[test]
    fn short_hex_seed_rejected() {
        assert!(matches!(
            keypair_from_hex("abcd"),
            Err(CryptoError::InvalidSeed(_))
        ));
        assert!(keypair_from_hex("not hex").is_err());
    }

    #[test]
    fn different_seeds_produce_different_keys() {
        let kp1 = keypair_from_seed(&[1u8; 32]);
        let kp2 = keypair_from_seed(&[2u8; 32]);
        assert_ne!(kp1.public, kp2.public);
    }
}
