use byteorder::{BigEndian, ByteOrder};

use crate::constants::{MAX_NON_FRAMED_SIZE, SEQUENCE_NUMBER_END};
use crate::headers::types::ContentType;
use crate::stream::framing::types::{BodyLayout, FrameError, FrameHeader};

/// Decode the next frame header from the front of `buf`.
///
/// - `Ok(None)` while `buf` is too short to hold the whole frame header.
/// - Layouts:
///   - regular frame: [ seq: u32 ][ iv ]                              (content length = frame length)
///   - final frame:   [ 0xFFFFFFFF ][ seq: u32 ][ iv ][ len: u32 ]
///   - non-framed:    [ iv ][ len: u64 ]                              (seq = 1, always final)
#[inline]
pub fn decode_body_header(buf: &[u8], layout: &BodyLayout) -> Result<Option<FrameHeader>, FrameError> {
    match layout.content_type {
        ContentType::Framed => decode_frame_header(buf, layout),
        ContentType::NonFramed => decode_non_framed_header(buf, layout),
    }
}

fn decode_frame_header(buf: &[u8], layout: &BodyLayout) -> Result<Option<FrameHeader>, FrameError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let tag_length_bits = (layout.tag_len * 8) as u32;

    let first = BigEndian::read_u32(&buf[0..4]);
    if first != SEQUENCE_NUMBER_END {
        let content_start = layout.regular_header_len();
        if buf.len() < content_start {
            return Ok(None);
        }
        if first == 0 {
            return Err(FrameError::ZeroSequenceNumber);
        }
        return Ok(Some(FrameHeader {
            sequence_number: first,
            iv: buf[4..content_start].to_vec(),
            content_length: layout.frame_length as u64,
            tag_length_bits,
            is_final_frame: false,
            content_start,
        }));
    }

    // final frame
    let iv_start = 8;
    let len_start = iv_start + layout.iv_len;
    let content_start = len_start + 4;
    if buf.len() < content_start {
        return Ok(None);
    }
    let sequence_number = BigEndian::read_u32(&buf[4..8]);
    if sequence_number == 0 {
        return Err(FrameError::ZeroSequenceNumber);
    }
    let content_length = BigEndian::read_u32(&buf[len_start..content_start]) as u64;
    if content_length > layout.frame_length as u64 {
        return Err(FrameError::FinalFrameTooLarge { content_length, frame_length: layout.frame_length });
    }

    Ok(Some(FrameHeader {
        sequence_number,
        iv: buf[iv_start..len_start].to_vec(),
        content_length,
        tag_length_bits,
        is_final_frame: true,
        content_start,
    }))
}

fn decode_non_framed_header(buf: &[u8], layout: &BodyLayout) -> Result<Option<FrameHeader>, FrameError> {
    let content_start = layout.iv_len + 8;
    if buf.len() < content_start {
        return Ok(None);
    }
    let content_length = BigEndian::read_u64(&buf[layout.iv_len..content_start]);
    if content_length > MAX_NON_FRAMED_SIZE {
        return Err(FrameError::NonFramedTooLarge { content_length, max: MAX_NON_FRAMED_SIZE });
    }

    Ok(Some(FrameHeader {
        sequence_number: 1,
        iv: buf[..layout.iv_len].to_vec(),
        content_length,
        tag_length_bits: (layout.tag_len * 8) as u32,
        is_final_frame: true,
        content_start,
    }))
}
