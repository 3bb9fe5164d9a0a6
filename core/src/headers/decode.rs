// ## 📂 File: `src/headers/decode.rs`
//! src/headers/decode.rs
//!
//! Incremental header decoding.
//!
//! Design notes:
//! - `Ok(None)` means "need more bytes" and is never an error; callers keep buffering.
//! - Structural errors are raised as soon as the offending field is readable.
//! - v1 carries its header IV on the wire; v2 uses an all-zero IV and only sends the tag.

use std::collections::btree_map::Entry;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use num_enum::TryFromPrimitive;

use crate::constants::{BASE64_FIRST_BYTE, HEADER_TYPE_CUSTOMER_AED, MESSAGE_ID_LEN_V1, MESSAGE_ID_LEN_V2};
use crate::crypto::suite::AlgorithmSuite;
use crate::headers::types::{
    ContentType, EncryptedDataKey, EncryptionContext, HeaderError, MessageFormat, MessageHeader,
};

/// Limits applied while decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecodeOptions {
    pub max_encrypted_data_keys: Option<u16>,
}

/// Big-endian cursor that reports exhaustion as `None`.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let out = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }
    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }
    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(BigEndian::read_u16)
    }
    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(BigEndian::read_u32)
    }
    fn u16_prefixed(&mut self) -> Option<&'a [u8]> {
        let len = self.u16()? as usize;
        self.take(len)
    }
}

macro_rules! need {
    ($e:expr) => {
        match $e {
            Some(v) => v,
            None => return Ok(None),
        }
    };
}

/// Try to decode a complete header (including header auth) from the front of `buf`.
///
/// # Returns
/// - `Ok(Some((header, consumed)))` once every header byte is present.
/// - `Ok(None)` if `buf` is a valid prefix that is still too short.
/// - `Err(HeaderError)` as soon as a field is invalid.
pub fn deserialize_message_header(
    buf: &[u8],
    opts: &HeaderDecodeOptions,
) -> Result<Option<(MessageHeader, usize)>, HeaderError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    match MessageFormat::try_from_primitive(first) {
        Ok(MessageFormat::V1) => deserialize_header_v1(buf, opts),
        Ok(MessageFormat::V2) => deserialize_header_v2(buf, opts),
        Err(_) if first == BASE64_FIRST_BYTE => Err(HeaderError::MaybeBase64),
        Err(_) => Err(HeaderError::UnsupportedVersion(first)),
    }
}

fn read_suite(c: &mut Cursor<'_>, version: MessageFormat) -> Result<Option<AlgorithmSuite>, HeaderError> {
    let raw = need!(c.u16());
    let suite = AlgorithmSuite::from_raw(raw).ok_or(HeaderError::UnsupportedSuite { raw })?;
    if suite.message_format != version as u8 {
        return Err(HeaderError::SuiteVersionMismatch { suite: suite.id, version });
    }
    Ok(Some(suite))
}

fn check_frame_length(content_type: ContentType, frame_length: u32) -> Result<(), HeaderError> {
    let ok = match content_type {
        ContentType::NonFramed => frame_length == 0,
        ContentType::Framed => frame_length > 0,
    };
    if !ok {
        return Err(HeaderError::FrameLengthMismatch { content_type, frame_length });
    }
    Ok(())
}

fn read_content_type(c: &mut Cursor<'_>) -> Result<Option<ContentType>, HeaderError> {
    let raw = need!(c.u8());
    ContentType::try_from_primitive(raw)
        .map(Some)
        .map_err(|_| HeaderError::UnknownContentType(raw))
}

fn deserialize_header_v1(
    buf: &[u8],
    opts: &HeaderDecodeOptions,
) -> Result<Option<(MessageHeader, usize)>, HeaderError> {
    let mut c = Cursor::new(buf);
    let _version = need!(c.u8());

    let header_type = need!(c.u8());
    if header_type != HEADER_TYPE_CUSTOMER_AED {
        return Err(HeaderError::UnsupportedType(header_type));
    }

    let suite = need!(read_suite(&mut c, MessageFormat::V1)?);
    let message_id = need!(c.take(MESSAGE_ID_LEN_V1)).to_vec();
    let encryption_context = decode_encryption_context(need!(c.u16_prefixed()))?;
    let encrypted_data_keys = need!(read_encrypted_data_keys(&mut c, opts)?);
    let content_type = need!(read_content_type(&mut c)?);

    let reserved = need!(c.take(4));
    if reserved.iter().any(|&b| b != 0) {
        return Err(HeaderError::ReservedBytesNonZero);
    }

    let iv_len = need!(c.u8()) as usize;
    if iv_len != suite.iv_len {
        return Err(HeaderError::IvLengthMismatch { have: iv_len, need: suite.iv_len });
    }

    let frame_length = need!(c.u32());
    check_frame_length(content_type, frame_length)?;

    let header_len = c.pos;
    let header_iv = need!(c.take(iv_len)).to_vec();
    let header_auth_tag = need!(c.take(suite.tag_len)).to_vec();

    let header = MessageHeader {
        version: MessageFormat::V1,
        suite_id: suite.id,
        message_id,
        encryption_context,
        encrypted_data_keys,
        content_type,
        frame_length,
        suite_data: Vec::new(),
        raw_header: Bytes::copy_from_slice(&buf[..header_len]),
        header_iv,
        header_auth_tag,
    };
    Ok(Some((header, c.pos)))
}

fn deserialize_header_v2(
    buf: &[u8],
    opts: &HeaderDecodeOptions,
) -> Result<Option<(MessageHeader, usize)>, HeaderError> {
    let mut c = Cursor::new(buf);
    let _version = need!(c.u8());

    let suite = need!(read_suite(&mut c, MessageFormat::V2)?);
    let message_id = need!(c.take(MESSAGE_ID_LEN_V2)).to_vec();
    let encryption_context = decode_encryption_context(need!(c.u16_prefixed()))?;
    let encrypted_data_keys = need!(read_encrypted_data_keys(&mut c, opts)?);
    let content_type = need!(read_content_type(&mut c)?);

    let frame_length = need!(c.u32());
    check_frame_length(content_type, frame_length)?;

    let suite_data = need!(c.take(suite.commitment_len)).to_vec();

    let header_len = c.pos;
    let header_auth_tag = need!(c.take(suite.tag_len)).to_vec();

    let header = MessageHeader {
        version: MessageFormat::V2,
        suite_id: suite.id,
        message_id,
        encryption_context,
        encrypted_data_keys,
        content_type,
        frame_length,
        suite_data,
        raw_header: Bytes::copy_from_slice(&buf[..header_len]),
        header_iv: vec![0u8; suite.iv_len],
        header_auth_tag,
    };
    Ok(Some((header, c.pos)))
}

fn read_encrypted_data_keys(
    c: &mut Cursor<'_>,
    opts: &HeaderDecodeOptions,
) -> Result<Option<Vec<EncryptedDataKey>>, HeaderError> {
    let count = need!(c.u16());
    if count == 0 {
        return Err(HeaderError::NoEncryptedDataKeys);
    }
    if let Some(max) = opts.max_encrypted_data_keys {
        if count > max {
            return Err(HeaderError::TooManyEncryptedDataKeys { count, max });
        }
    }

    let mut keys = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let provider_id = need!(c.u16_prefixed());
        let provider_info = need!(c.u16_prefixed());
        let encrypted_data_key = need!(c.u16_prefixed());
        keys.push(EncryptedDataKey {
            provider_id: std::str::from_utf8(provider_id)
                .map_err(|_| HeaderError::InvalidUtf8("provider id"))?
                .to_owned(),
            provider_info: provider_info.to_vec(),
            encrypted_data_key: encrypted_data_key.to_vec(),
        });
    }
    Ok(Some(keys))
}

/// Decode a complete encryption context section.
///
/// A zero-length section is the empty map. Otherwise the section must hold exactly
/// `pair count` unique pairs and nothing else.
pub fn decode_encryption_context(section: &[u8]) -> Result<EncryptionContext, HeaderError> {
    let mut context = EncryptionContext::new();
    if section.is_empty() {
        return Ok(context);
    }

    let mut c = Cursor::new(section);
    let pairs = c.u16().ok_or(HeaderError::MalformedEncryptionContext("missing pair count"))?;
    for _ in 0..pairs {
        let (Some(key), Some(value)) = (c.u16_prefixed(), c.u16_prefixed()) else {
            return Err(HeaderError::MalformedEncryptionContext("section shorter than its pairs"));
        };
        let key = std::str::from_utf8(key).map_err(|_| HeaderError::InvalidUtf8("encryption context key"))?;
        let value = std::str::from_utf8(value).map_err(|_| HeaderError::InvalidUtf8("encryption context value"))?;
        match context.entry(key.to_owned()) {
            Entry::Occupied(_) => return Err(HeaderError::DuplicateContextKey(key.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(value.to_owned());
            }
        }
    }

    if c.pos != section.len() {
        return Err(HeaderError::MalformedEncryptionContext("overflow, too much data"));
    }
    Ok(context)
}
