//! types.rs
//! Unified decrypt error surfaced by every public entry point.
//!
//! Design notes:
//! - Every variant is terminal for the stream; nothing is retried internally.
//! - Lower layers (`HeaderError`, `FrameError`, `CryptoError`) convert via `From` so `?` works across stages.
//! - Messages aim to be stable and contextual for logs.

use std::io;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::headers::HeaderError;
use crate::stream::framing::FrameError;

#[derive(Debug, Error)]
pub enum DecryptError {
    /// Input ended before a complete header was parsed.
    #[error("incomplete header")]
    IncompleteHeader,

    /// Suite is not permitted by the configured commitment or signature policy.
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    /// External resolver failed or returned unusable materials.
    #[error("materials resolution failed: {0}")]
    MaterialsResolutionFailure(String),

    #[error("header authentication failed")]
    HeaderAuthenticationFailure,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unsupported algorithm suite: 0x{0:04x}")]
    UnsupportedAlgorithmSuite(u16),

    #[error("too many encrypted data keys: {count} > {max}")]
    TooManyEncryptedDataKeys { count: u16, max: u16 },

    /// Derived commitment does not match the header suite data.
    #[error("key commitment mismatch")]
    KeyCommitmentMismatch,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("sequence out of order: expected {expected}, got {actual}")]
    SequenceOutOfOrder { expected: u32, actual: u32 },

    #[error("body size exceeded: declared {declared} > max {max}")]
    BodySizeExceeded { declared: u64, max: u64 },

    /// Input ended mid-frame, before the final tag, or before the signature.
    #[error("incomplete message: {0}")]
    IncompleteMessage(&'static str),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// Decipher stage invariant violated.
    #[error("malformed state: {0}")]
    MalformedState(&'static str),

    /// Per-frame AEAD tag did not verify.
    #[error("authentication failed for frame {sequence_number}")]
    AuthenticationFailure { sequence_number: u32 },

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stage channel closed underneath its peer.
    #[error("pipeline error: {0}")]
    Pipeline(&'static str),
}

impl From<HeaderError> for DecryptError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::UnsupportedSuite { raw } => DecryptError::UnsupportedAlgorithmSuite(raw),
            HeaderError::TooManyEncryptedDataKeys { count, max } => {
                DecryptError::TooManyEncryptedDataKeys { count, max }
            }
            other => DecryptError::MalformedHeader(other.to_string()),
        }
    }
}

impl From<FrameError> for DecryptError {
    fn from(e: FrameError) -> Self {
        DecryptError::MalformedFrame(e.to_string())
    }
}

impl From<CryptoError> for DecryptError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::CommitmentMismatch => DecryptError::KeyCommitmentMismatch,
            CryptoError::InvalidKeyLen { expected, actual } => DecryptError::MaterialsResolutionFailure(
                format!("data key length {} does not match suite key length {}", actual, expected),
            ),
            CryptoError::InvalidVerificationKey(msg) => DecryptError::MaterialsResolutionFailure(msg),
            CryptoError::SignatureMismatch | CryptoError::MalformedSignature(_) => {
                DecryptError::SignatureInvalid(e.to_string())
            }
            other => DecryptError::Crypto(other),
        }
    }
}
