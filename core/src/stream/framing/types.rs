use thiserror::Error;

use crate::headers::types::{ContentType, MessageHeader};

/// Decode parameters fixed by the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLayout {
    pub content_type: ContentType,
    pub frame_length: u32,
    pub iv_len: usize,
    pub tag_len: usize,
}

impl BodyLayout {
    pub fn from_header(header: &MessageHeader) -> Self {
        let suite = header.suite();
        Self {
            content_type: header.content_type,
            frame_length: header.frame_length,
            iv_len: suite.iv_len,
            tag_len: suite.tag_len,
        }
    }

    /// Fixed-size frame-header length for a regular (non-final) frame.
    pub fn regular_header_len(&self) -> usize {
        4 + self.iv_len
    }
}

/// One decoded frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// 1-based; always 1 for non-framed content.
    pub sequence_number: u32,
    pub iv: Vec<u8>,
    pub content_length: u64,
    pub tag_length_bits: u32,
    pub is_final_frame: bool,
    /// Offset where content begins (equals the encoded frame-header length).
    pub content_start: usize,
}

impl FrameHeader {
    pub fn tag_len(&self) -> usize {
        (self.tag_length_bits / 8) as usize
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed sequence number: 0")]
    ZeroSequenceNumber,

    #[error("final frame content length {content_length} exceeds frame length {frame_length}")]
    FinalFrameTooLarge { content_length: u64, frame_length: u32 },

    #[error("non-framed content length {content_length} exceeds {max}")]
    NonFramedTooLarge { content_length: u64, max: u64 },

    #[error("{0} trailing bytes after final frame")]
    TrailingBytes(usize),
}
