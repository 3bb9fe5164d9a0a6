// ## 📂 File: `src/headers/types.rs`

//! headers/types.rs
//! Message header types and header-level errors.
//!
//! Industry notes:
//! - All multi-byte integers are big-endian on the wire.
//! - The header is immutable once parsed; `raw_header` is exactly the byte range the
//!   header tag authenticates (and the signature covers first).
//! - Encryption context is ordered by key so serialization is deterministic.

use std::collections::BTreeMap;

use bytes::Bytes;
use num_enum::TryFromPrimitive;
use thiserror::Error;

use crate::crypto::suite::{AlgorithmSuite, AlgorithmSuiteId};
use crate::utils::enum_name_or_hex;

/// Message format versions.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum MessageFormat {
    V1 = 0x01,
    V2 = 0x02,
}

/// Body content type.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum ContentType {
    NonFramed = 0x01,
    Framed = 0x02,
}

/// Caller-supplied key/value metadata bound to the message.
pub type EncryptionContext = BTreeMap<String, String>;

/// A data key as wrapped by one key-management provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDataKey {
    pub provider_id: String,
    pub provider_info: Vec<u8>,
    pub encrypted_data_key: Vec<u8>,
}

/// Parsed, immutable message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: MessageFormat,
    pub suite_id: AlgorithmSuiteId,
    pub message_id: Vec<u8>,
    pub encryption_context: EncryptionContext,
    pub encrypted_data_keys: Vec<EncryptedDataKey>,
    pub content_type: ContentType,
    /// 0 for non-framed content.
    pub frame_length: u32,
    /// Key commitment (v2 only, empty for v1).
    pub suite_data: Vec<u8>,
    /// Bytes covered by the header auth tag.
    pub raw_header: Bytes,
    pub header_iv: Vec<u8>,
    pub header_auth_tag: Vec<u8>,
}

impl MessageHeader {
    pub fn suite(&self) -> AlgorithmSuite {
        AlgorithmSuite::new(self.suite_id)
    }

    /// Header IV and tag as they appear on the wire (v2 omits the IV).
    pub fn header_auth_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_iv.len() + self.header_auth_tag.len());
        if self.version == MessageFormat::V1 {
            out.extend_from_slice(&self.header_iv);
        }
        out.extend_from_slice(&self.header_auth_tag);
        out
    }

    /// Total bytes the header occupied on the wire.
    pub fn wire_len(&self) -> usize {
        self.raw_header.len() + self.header_auth_bytes().len()
    }
}

fn suite_name(raw: &u16) -> String {
    enum_name_or_hex::<AlgorithmSuiteId>(*raw)
}

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("unsupported message format version: 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("this blob may be base64 encoded")]
    MaybeBase64,

    #[error("unsupported header type: 0x{0:02x}")]
    UnsupportedType(u8),

    #[error("unsupported algorithm suite: {}", suite_name(.raw))]
    UnsupportedSuite { raw: u16 },

    #[error("suite {suite:?} is not valid for message format {version:?}")]
    SuiteVersionMismatch { suite: AlgorithmSuiteId, version: MessageFormat },

    #[error("reserved bytes must be zero")]
    ReservedBytesNonZero,

    #[error("IV length {have} does not match suite IV length {need}")]
    IvLengthMismatch { have: usize, need: usize },

    #[error("unknown content type: 0x{0:02x}")]
    UnknownContentType(u8),

    #[error("frame length {frame_length} is invalid for content type {content_type:?}")]
    FrameLengthMismatch { content_type: ContentType, frame_length: u32 },

    #[error("malformed encryption context: {0}")]
    MalformedEncryptionContext(&'static str),

    #[error("duplicate encryption context key: {0}")]
    DuplicateContextKey(String),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("no encrypted data keys")]
    NoEncryptedDataKeys,

    #[error("too many encrypted data keys: {count} > {max}")]
    TooManyEncryptedDataKeys { count: u16, max: u16 },

    /// Encoder side: a length does not fit its u16 prefix.
    #[error("{0} too long to serialize")]
    FieldTooLong(&'static str),
}
