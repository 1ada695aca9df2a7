use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key seed: {0}")]
    InvalidSeed(String),

    #[error("system randomness unavailable: {0}")]
    Randomness(String),
}
