//! stream/messages.rs
//! Closed set of messages passed between the three stages.
//!
//! Design notes:
//! - Control and data flow HeaderParser → FrameVerifier → FrameDecipher only.
//! - The single backward signal is the `ack` carried by `AuthTag`: the verifier
//!   awaits it before touching the next frame, so at most one frame is in flight.

use std::sync::Arc;

use bytes::Bytes;
use futures::channel::oneshot;

use crate::crypto::aead::AeadImpl;
use crate::crypto::signature::SignatureVerifier;
use crate::headers::types::ContentType;
use crate::materials::MaterialsGuard;
use crate::stream::framing::BodyLayout;

/// Everything the decipher stage needs for the whole message.
#[derive(Debug)]
pub struct DecipherInfo {
    pub message_id: Vec<u8>,
    pub content_type: ContentType,
    pub cipher: Arc<AeadImpl>,
    pub materials: MaterialsGuard,
}

/// Bootstrap for the verifier, emitted once the header authenticates.
#[derive(Debug)]
pub struct VerifyInfo {
    pub layout: BodyLayout,
    /// Present for signed suites; already fed the header bytes.
    pub signature: Option<SignatureVerifier>,
    pub decipher: DecipherInfo,
}

/// HeaderParser → FrameVerifier
#[derive(Debug)]
pub enum HeaderStageMessage {
    VerifyInfo(Box<VerifyInfo>),
    /// Post-header bytes, unmodified.
    Chunk(Bytes),
}

/// Per-frame metadata, sent before the frame's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyInfo {
    pub iv: Vec<u8>,
    pub sequence_number: u32,
    pub content_length: u64,
    pub is_final_frame: bool,
}

/// FrameVerifier → FrameDecipher
#[derive(Debug)]
pub enum VerifierMessage {
    DecipherInfo(Box<DecipherInfo>),
    BodyInfo(BodyInfo),
    Content(Bytes),
    /// The frame's tag plus the continuation the verifier is waiting on.
    AuthTag { tag: Bytes, ack: oneshot::Sender<()> },
}
