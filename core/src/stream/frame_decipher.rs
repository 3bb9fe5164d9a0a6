//! stream/frame_decipher.rs
//! Stage 3: hold one frame's ciphertext until its tag arrives, authenticate, release plaintext.
//!
//! Design notes:
//! - State is `Idle | Accumulating | Decrypting`, matched on every message.
//! - AES-GCM authenticates the whole frame in `FrameCipher::finalize`; nothing from the
//!   frame is pushed before that succeeds.
//! - Plaintext goes out over a bounded channel, one chunk at a time, with a yield between
//!   chunks. The verifier's ack is released only after the last chunk was accepted.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::{SinkExt, StreamExt};
use tracing::{debug, trace, warn};

use crate::crypto::aad::build_frame_aad;
use crate::crypto::aead::{AeadImpl, FrameCipher};
use crate::headers::types::ContentType;
use crate::materials::MaterialsGuard;
use crate::stream::messages::{BodyInfo, DecipherInfo, VerifierMessage};
use crate::telemetry::{DecryptCounters, Stage};
use crate::types::DecryptError;
use crate::utils::yield_now;

#[derive(Debug)]
enum DecipherPhase {
    Idle,
    Accumulating { cipher: FrameCipher, remaining: u64, sequence_number: u32 },
    /// Tag received; plaintext is being authenticated and released.
    Decrypting,
}

/// Message-wide state delivered by `DecipherInfo`.
struct MessageState {
    message_id: Vec<u8>,
    content_type: ContentType,
    cipher: Arc<AeadImpl>,
}

pub struct FrameDecipher {
    phase: DecipherPhase,
    message: Option<MessageState>,
    materials: MaterialsGuard,
    counters: DecryptCounters,
}

impl Default for FrameDecipher {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecipher {
    pub fn new() -> Self {
        Self {
            phase: DecipherPhase::Idle,
            message: None,
            materials: MaterialsGuard::default(),
            counters: DecryptCounters::default(),
        }
    }

    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<VerifierMessage>,
        mut output: mpsc::Sender<Bytes>,
    ) -> Result<DecryptCounters, DecryptError> {
        while let Some(message) = input.next().await {
            match message {
                VerifierMessage::DecipherInfo(info) => self.on_decipher_info(*info)?,
                VerifierMessage::BodyInfo(body) => self.on_body_info(body)?,
                VerifierMessage::Content(content) => self.on_content(content)?,
                VerifierMessage::AuthTag { tag, ack } => self.on_auth_tag(tag, ack, &mut output).await?,
            }
        }

        if !matches!(self.phase, DecipherPhase::Idle) {
            return Err(DecryptError::MalformedState("input closed with a frame in flight"));
        }
        self.materials.dispose();
        Ok(self.counters)
    }

    fn on_decipher_info(&mut self, info: DecipherInfo) -> Result<(), DecryptError> {
        if self.message.is_some() {
            return Err(DecryptError::MalformedState("decipher info received twice"));
        }
        self.message = Some(MessageState {
            message_id: info.message_id,
            content_type: info.content_type,
            cipher: info.cipher,
        });
        self.materials = info.materials;
        Ok(())
    }

    fn on_body_info(&mut self, body: BodyInfo) -> Result<(), DecryptError> {
        match self.phase {
            DecipherPhase::Idle => {}
            DecipherPhase::Accumulating { .. } | DecipherPhase::Decrypting => {
                return Err(DecryptError::MalformedState("body info while a frame is active"))
            }
        }
        let message = self
            .message
            .as_ref()
            .ok_or(DecryptError::MalformedState("body info before decipher info"))?;

        let aad = build_frame_aad(
            &message.message_id,
            message.content_type,
            body.is_final_frame,
            body.sequence_number,
            body.content_length,
        );
        let cipher = FrameCipher::new(Arc::clone(&message.cipher), &body.iv, aad)?;
        trace!(sequence_number = body.sequence_number, content_length = body.content_length, "frame opened");

        self.phase = DecipherPhase::Accumulating {
            cipher,
            remaining: body.content_length,
            sequence_number: body.sequence_number,
        };
        Ok(())
    }

    fn on_content(&mut self, content: Bytes) -> Result<(), DecryptError> {
        let DecipherPhase::Accumulating { cipher, remaining, .. } = &mut self.phase else {
            return Err(DecryptError::MalformedState("content without an active frame"));
        };
        let len = content.len() as u64;
        if len > *remaining {
            return Err(DecryptError::MalformedState("content exceeds declared frame length"));
        }
        *remaining -= len;
        cipher.update(&content);
        Ok(())
    }

    async fn on_auth_tag(
        &mut self,
        tag: Bytes,
        ack: oneshot::Sender<()>,
        output: &mut mpsc::Sender<Bytes>,
    ) -> Result<(), DecryptError> {
        let (cipher, sequence_number) = match std::mem::replace(&mut self.phase, DecipherPhase::Idle) {
            DecipherPhase::Accumulating { remaining, .. } if remaining != 0 => {
                return Err(DecryptError::MalformedState("auth tag before frame content drained"))
            }
            DecipherPhase::Accumulating { cipher, sequence_number, .. } => (cipher, sequence_number),
            DecipherPhase::Idle | DecipherPhase::Decrypting => {
                return Err(DecryptError::MalformedState("auth tag without an active frame"))
            }
        };
        self.phase = DecipherPhase::Decrypting;

        // 1️⃣ Authenticate + decrypt (the frame's integrity check)
        let started = Instant::now();
        let chunks = cipher.finalize(&tag).map_err(|_| {
            warn!(sequence_number, "frame authentication failed");
            DecryptError::AuthenticationFailure { sequence_number }
        })?;
        self.counters.add_stage_time(Stage::Decrypt, started.elapsed());

        // 2️⃣ Release under backpressure
        let mut released = 0usize;
        for (i, chunk) in chunks.into_iter().enumerate() {
            if i > 0 {
                yield_now().await;
            }
            released += chunk.len();
            output
                .send(chunk)
                .await
                .map_err(|_| DecryptError::Pipeline("plaintext receiver dropped"))?;
        }
        self.counters.add_plaintext(released);
        debug!(sequence_number, bytes = released, "frame plaintext released");

        // 3️⃣ Let the verifier move on
        self.phase = DecipherPhase::Idle;
        let _ = ack.send(());
        Ok(())
    }
}
