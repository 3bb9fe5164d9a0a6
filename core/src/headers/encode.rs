// ## 📂 File: `src/headers/encode.rs`
//! src/headers/encode.rs
//!
//! Header serialization.
//!
//! Design notes:
//! - Field order must match `decode.rs` exactly.
//! - Only the logical fields of `MessageHeader` are read; `raw_header`, `header_iv`
//!   and `header_auth_tag` are outputs of this step, not inputs.
//! - Encryption context pairs are written in key order (BTreeMap iteration order).

use bytes::BufMut;

use crate::constants::HEADER_TYPE_CUSTOMER_AED;
use crate::headers::types::{EncryptedDataKey, EncryptionContext, HeaderError, MessageFormat, MessageHeader};

fn u16_len(len: usize, field: &'static str) -> Result<u16, HeaderError> {
    u16::try_from(len).map_err(|_| HeaderError::FieldTooLong(field))
}

fn put_u16_prefixed(out: &mut Vec<u8>, bytes: &[u8], field: &'static str) -> Result<(), HeaderError> {
    out.put_u16(u16_len(bytes.len(), field)?);
    out.put_slice(bytes);
    Ok(())
}

/// Serialize the encryption context section (without its outer length prefix).
pub fn serialize_encryption_context(context: &EncryptionContext) -> Result<Vec<u8>, HeaderError> {
    let mut out = Vec::new();
    if context.is_empty() {
        return Ok(out);
    }
    out.put_u16(u16_len(context.len(), "encryption context")?);
    for (key, value) in context {
        put_u16_prefixed(&mut out, key.as_bytes(), "encryption context key")?;
        put_u16_prefixed(&mut out, value.as_bytes(), "encryption context value")?;
    }
    Ok(out)
}

/// Serialize the encrypted data key section, including its count.
pub fn serialize_encrypted_data_keys(keys: &[EncryptedDataKey]) -> Result<Vec<u8>, HeaderError> {
    if keys.is_empty() {
        return Err(HeaderError::NoEncryptedDataKeys);
    }
    let mut out = Vec::new();
    out.put_u16(u16_len(keys.len(), "encrypted data keys")?);
    for edk in keys {
        put_u16_prefixed(&mut out, edk.provider_id.as_bytes(), "provider id")?;
        put_u16_prefixed(&mut out, &edk.provider_info, "provider info")?;
        put_u16_prefixed(&mut out, &edk.encrypted_data_key, "encrypted data key")?;
    }
    Ok(out)
}

/// Serialize the authenticated header bytes (everything before the header IV/tag).
pub fn serialize_message_header(h: &MessageHeader) -> Result<Vec<u8>, HeaderError> {
    let suite = h.suite();
    if suite.message_format != h.version as u8 {
        return Err(HeaderError::SuiteVersionMismatch { suite: h.suite_id, version: h.version });
    }

    let context = serialize_encryption_context(&h.encryption_context)?;
    let keys = serialize_encrypted_data_keys(&h.encrypted_data_keys)?;

    let mut out = Vec::with_capacity(64 + context.len() + keys.len());
    out.put_u8(h.version as u8);
    if h.version == MessageFormat::V1 {
        out.put_u8(HEADER_TYPE_CUSTOMER_AED);
    }
    out.put_u16(suite.raw());
    out.put_slice(&h.message_id);
    put_u16_prefixed(&mut out, &context, "encryption context")?;
    out.put_slice(&keys);
    out.put_u8(h.content_type as u8);

    match h.version {
        MessageFormat::V1 => {
            out.put_u32(0); // reserved
            out.put_u8(suite.iv_len as u8);
            out.put_u32(h.frame_length);
        }
        MessageFormat::V2 => {
            out.put_u32(h.frame_length);
            out.put_slice(&h.suite_data);
        }
    }
    Ok(out)
}

/// Header auth section: v1 writes IV then tag, v2 writes only the tag.
pub fn serialize_header_auth(version: MessageFormat, iv: &[u8], tag: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(iv.len() + tag.len());
    if version == MessageFormat::V1 {
        out.put_slice(iv);
    }
    out.put_slice(tag);
    out
}
