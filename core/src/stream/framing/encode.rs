use bytes::BufMut;

use crate::constants::SEQUENCE_NUMBER_END;

/// Deterministic frame IV: zero padding followed by the sequence number (u32 BE).
pub fn frame_iv(iv_len: usize, sequence_number: u32) -> Vec<u8> {
    let mut iv = vec![0u8; iv_len];
    let seq = sequence_number.to_be_bytes();
    let n = iv_len.min(seq.len());
    iv[iv_len - n..].copy_from_slice(&seq[seq.len() - n..]);
    iv
}

/// [ seq: u32 ][ iv ]
pub fn serialize_frame_header(sequence_number: u32, iv: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + iv.len());
    out.put_u32(sequence_number);
    out.put_slice(iv);
    out
}

/// [ 0xFFFFFFFF ][ seq: u32 ][ iv ][ content_len: u32 ]
pub fn serialize_final_frame_header(sequence_number: u32, iv: &[u8], content_length: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + iv.len());
    out.put_u32(SEQUENCE_NUMBER_END);
    out.put_u32(sequence_number);
    out.put_slice(iv);
    out.put_u32(content_length);
    out
}

/// [ iv ][ content_len: u64 ]
pub fn serialize_non_framed_body_header(iv: &[u8], content_length: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(iv.len() + 8);
    out.put_slice(iv);
    out.put_u64(content_length);
    out
}
