//! constants.rs
//! Wire-level constants shared by the header, framing and crypto layers.

/// Message format versions.
pub const MESSAGE_FORMAT_V1: u8 = 0x01;
pub const MESSAGE_FORMAT_V2: u8 = 0x02;

/// v1 header type byte ("customer authenticated encrypted data").
pub const HEADER_TYPE_CUSTOMER_AED: u8 = 0x80;

/// Message ID lengths per format version.
pub const MESSAGE_ID_LEN_V1: usize = 16;
pub const MESSAGE_ID_LEN_V2: usize = 32;

/// First byte of a base64-encoded header.
pub const BASE64_FIRST_BYTE: u8 = b'A';

/// Final-frame marker in place of a sequence number.
pub const SEQUENCE_NUMBER_END: u32 = 0xFFFF_FFFF;

/// Largest content length accepted for a non-framed body (2^36 - 32).
pub const MAX_NON_FRAMED_SIZE: u64 = (1 << 36) - 32;

/// AAD content strings bound into every body tag.
pub mod content_aad {
    pub const FRAME: &str = "AWSKMSEncryptionClient Frame";
    pub const FINAL_FRAME: &str = "AWSKMSEncryptionClient Final Frame";
    pub const SINGLE_BLOCK: &str = "AWSKMSEncryptionClient Single Block";
}

/// Encryption context key carrying the base64 signature verification key.
pub const ENCODED_SIGNER_KEY: &str = "aws-crypto-public-key";

/// HKDF labels for committing suites.
pub const DERIVE_KEY_LABEL: &[u8] = b"DERIVEKEY";
pub const COMMIT_KEY_LABEL: &[u8] = b"COMMITKEY";

/// Defaults when Option<T> is None
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024; // 64 KiB
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;
