use thiserror::Error;

/// Errors raised while parsing the textual forms of core types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid account identity: {0}")]
    InvalidAccount(String),

    #[error("invalid transaction id: {0}")]
    InvalidTxId(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}
