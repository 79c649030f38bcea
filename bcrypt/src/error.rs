//! Error taxonomy shared by every hashing operation. Each failure mode keeps
//! its own variant so callers can match on the exact reason a hash was refused.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BcryptError {
    /// Malformed salt or hash string structure.
    #[error("salt parse failed: {0}")]
    SaltParse(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid work factor {0}; expected a value between 4 and 31 (inclusive)")]
    InvalidCost(u32),
    #[error("invalid salt length {0}; expected 16 bytes")]
    InvalidSaltLength(usize),
    /// The current credential did not verify, so no replacement hash was issued.
    #[error("current credentials could not be authenticated")]
    Authentication,
    #[error("error handling hash interrogation: {0}")]
    HashInformation(#[source] Box<BcryptError>),
}

impl BcryptError {
    pub(crate) fn invalid_hash_format() -> Self {
        BcryptError::SaltParse("Invalid Hash Format".to_string())
    }
}
