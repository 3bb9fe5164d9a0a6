// ## 📂 File: `src/crypto/types.rs`

use thiserror::Error;

/// Standard 12-byte IV length for every supported suite.
pub const IV_LEN_12: usize = 12;

/// Fixed AEAD tag length (bytes).
pub const TAG_LEN: usize = 16;

/// Commitment value length for committing suites.
pub const COMMITMENT_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key length provided to cipher or KDF.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLen { expected: usize, actual: usize },

    /// IV length mismatch (must match the suite).
    #[error("invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLen { expected: usize, actual: usize },

    #[error("invalid tag length: expected {expected}, got {actual}")]
    InvalidTagLen { expected: usize, actual: usize },

    /// AEAD tag mismatch (authentication failure).
    #[error("authentication tag mismatch")]
    TagMismatch,

    #[error("AEAD seal failed")]
    SealFailed,

    /// Derived commitment differs from the header suite data.
    #[error("key commitment mismatch")]
    CommitmentMismatch,

    #[error("key derivation failed: {0}")]
    KeyDerivation(&'static str),

    #[error("invalid verification key: {0}")]
    InvalidVerificationKey(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature does not verify")]
    SignatureMismatch,
}
