// ## 📂 File: `src/crypto/aad.rs`

use crate::constants::content_aad;
use crate::headers::types::ContentType;

/// Which body string is bound into a frame's AAD.
#[inline]
pub fn content_aad_string(content_type: ContentType, is_final_frame: bool) -> &'static str {
    match (content_type, is_final_frame) {
        (ContentType::NonFramed, _) => content_aad::SINGLE_BLOCK,
        (ContentType::Framed, true) => content_aad::FINAL_FRAME,
        (ContentType::Framed, false) => content_aad::FRAME,
    }
}

/// Frame AAD: message id ‖ content string ‖ sequence number (u32 BE) ‖ content length (u64 BE).
#[inline]
pub fn build_frame_aad(
    message_id: &[u8],
    content_type: ContentType,
    is_final_frame: bool,
    sequence_number: u32,
    content_length: u64,
) -> Vec<u8> {
    let body = content_aad_string(content_type, is_final_frame);
    let mut out = Vec::with_capacity(message_id.len() + body.len() + 4 + 8);

    // 1️⃣ Bind the message
    out.extend_from_slice(message_id);
    // 2️⃣ Bind the frame kind
    out.extend_from_slice(body.as_bytes());
    // 3️⃣ Bind position and size (truncation protection)
    out.extend_from_slice(&sequence_number.to_be_bytes());
    out.extend_from_slice(&content_length.to_be_bytes());

    out
}
