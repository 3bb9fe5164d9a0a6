//! stream/frame_verifier.rs
//! Stage 2: split the post-header bytes into frames, enforce ordering and size bounds,
//! and keep the whole-message signature.
//!
//! Design notes:
//! - Content is forwarded as it arrives; only frame headers, tags and the signature
//!   footer are buffered here.
//! - Every byte handed downstream is fed to the signature accumulator at hand-off.
//! - After a non-final tag the stage waits on the decipher ack before reading further,
//!   so frame N's plaintext is delivered before frame N+1 is looked at.
//! - The final tag is held back until `flush` has verified the signature.

use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures::channel::{mpsc, oneshot};
use futures::{SinkExt, StreamExt};
use tracing::{debug, trace, warn};

use crate::crypto::signature::{deserialize_signature_info, max_signature_footer_len, SignatureVerifier};
use crate::stream::framing::{decode_body_header, BodyLayout, FrameError, FrameHeader};
use crate::stream::messages::{BodyInfo, HeaderStageMessage, VerifierMessage};
use crate::telemetry::{DecryptCounters, Stage};
use crate::types::DecryptError;

#[derive(Debug)]
enum VerifyPhase {
    AwaitingFrameHeader,
    AccumulatingContent { frame: FrameHeader, remaining: u64 },
    AwaitingTag { frame: FrameHeader },
    AwaitingSignatureTail { final_tag: Bytes },
}

pub struct FrameVerifier {
    max_body_size: Option<u64>,
    layout: Option<BodyLayout>,
    phase: VerifyPhase,
    /// Unparsed frame-header bytes, later the signature footer.
    buffer: BytesMut,
    tag_buffer: BytesMut,
    signature: Option<SignatureVerifier>,
    next_sequence: u32,
    counters: DecryptCounters,
}

impl FrameVerifier {
    pub fn new(max_body_size: Option<u64>) -> Self {
        Self {
            max_body_size,
            layout: None,
            phase: VerifyPhase::AwaitingFrameHeader,
            buffer: BytesMut::new(),
            tag_buffer: BytesMut::new(),
            signature: None,
            next_sequence: 1,
            counters: DecryptCounters::default(),
        }
    }

    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<HeaderStageMessage>,
        mut output: mpsc::Sender<VerifierMessage>,
    ) -> Result<DecryptCounters, DecryptError> {
        // 1️⃣ Bootstrap
        let info = match input.next().await {
            Some(HeaderStageMessage::VerifyInfo(info)) => *info,
            Some(HeaderStageMessage::Chunk(_)) => {
                return Err(DecryptError::Pipeline("body bytes arrived before verify info"))
            }
            None => return Err(DecryptError::Pipeline("header stage closed before verify info")),
        };
        self.layout = Some(info.layout);
        self.signature = info.signature;
        send(&mut output, VerifierMessage::DecipherInfo(Box::new(info.decipher))).await?;

        // 2️⃣ Body
        while let Some(message) = input.next().await {
            match message {
                HeaderStageMessage::Chunk(chunk) => self.process_chunk(chunk, &mut output).await?,
                HeaderStageMessage::VerifyInfo(_) => {
                    return Err(DecryptError::Pipeline("verify info received twice"))
                }
            }
        }

        // 3️⃣ End of input
        self.flush(&mut output).await?;
        Ok(self.counters)
    }

    async fn process_chunk(
        &mut self,
        mut chunk: Bytes,
        output: &mut mpsc::Sender<VerifierMessage>,
    ) -> Result<(), DecryptError> {
        let layout = self.layout.ok_or(DecryptError::Pipeline("verifier has no body layout"))?;
        trace!(len = chunk.len(), phase = ?self.phase, "verifier chunk");

        loop {
            let phase = std::mem::replace(&mut self.phase, VerifyPhase::AwaitingFrameHeader);
            match phase {
                VerifyPhase::AwaitingFrameHeader => {
                    if chunk.is_empty() {
                        return Ok(());
                    }
                    self.buffer.extend_from_slice(&chunk);
                    let Some(frame) = decode_body_header(&self.buffer, &layout)? else {
                        chunk = Bytes::new();
                        continue;
                    };
                    self.check_frame(&frame)?;

                    let header_bytes = self.buffer.split_to(frame.content_start).freeze();
                    chunk = self.buffer.split().freeze();
                    self.hand_off(&header_bytes);
                    self.counters.add_frame(frame.is_final_frame, header_bytes.len());
                    debug!(
                        sequence_number = frame.sequence_number,
                        content_length = frame.content_length,
                        is_final_frame = frame.is_final_frame,
                        "frame header decoded"
                    );

                    send(
                        output,
                        VerifierMessage::BodyInfo(BodyInfo {
                            iv: frame.iv.clone(),
                            sequence_number: frame.sequence_number,
                            content_length: frame.content_length,
                            is_final_frame: frame.is_final_frame,
                        }),
                    )
                    .await?;

                    self.phase = if frame.content_length == 0 {
                        VerifyPhase::AwaitingTag { frame }
                    } else {
                        let remaining = frame.content_length;
                        VerifyPhase::AccumulatingContent { frame, remaining }
                    };
                }

                VerifyPhase::AccumulatingContent { frame, mut remaining } => {
                    if chunk.is_empty() {
                        self.phase = VerifyPhase::AccumulatingContent { frame, remaining };
                        return Ok(());
                    }
                    let take = remaining.min(chunk.len() as u64) as usize;
                    let content = chunk.split_to(take);
                    remaining -= take as u64;

                    self.hand_off(&content);
                    self.counters.add_ciphertext(content.len());
                    send(output, VerifierMessage::Content(content)).await?;

                    self.phase = if remaining == 0 {
                        VerifyPhase::AwaitingTag { frame }
                    } else {
                        VerifyPhase::AccumulatingContent { frame, remaining }
                    };
                }

                VerifyPhase::AwaitingTag { frame } => {
                    if chunk.is_empty() {
                        self.phase = VerifyPhase::AwaitingTag { frame };
                        return Ok(());
                    }
                    let needed = frame.tag_len() - self.tag_buffer.len();
                    let take = needed.min(chunk.len());
                    self.tag_buffer.extend_from_slice(&chunk.split_to(take));
                    if self.tag_buffer.len() < frame.tag_len() {
                        self.phase = VerifyPhase::AwaitingTag { frame };
                        continue;
                    }

                    let tag = self.tag_buffer.split().freeze();
                    self.hand_off(&tag);
                    self.counters.add_tag(tag.len());

                    if frame.is_final_frame {
                        self.phase = VerifyPhase::AwaitingSignatureTail { final_tag: tag };
                        continue;
                    }

                    // Suspend until the decipher stage has delivered this frame.
                    let (ack, done) = oneshot::channel();
                    send(output, VerifierMessage::AuthTag { tag, ack }).await?;
                    done.await
                        .map_err(|_| DecryptError::Pipeline("decipher stage dropped frame acknowledgement"))?;
                    trace!(sequence_number = frame.sequence_number, "frame acknowledged");
                    self.phase = VerifyPhase::AwaitingFrameHeader;
                }

                VerifyPhase::AwaitingSignatureTail { final_tag } => {
                    self.phase = VerifyPhase::AwaitingSignatureTail { final_tag };
                    if chunk.is_empty() {
                        return Ok(());
                    }
                    let Some(signature) = self.signature.as_ref() else {
                        return Err(FrameError::TrailingBytes(chunk.len()).into());
                    };
                    let limit = max_signature_footer_len(signature.curve());
                    if self.buffer.len() + chunk.len() > limit {
                        warn!(limit, "signature footer exceeds the curve's maximum length");
                        return Err(DecryptError::SignatureInvalid(format!(
                            "signature footer longer than {} bytes",
                            limit
                        )));
                    }
                    self.buffer.extend_from_slice(&chunk);
                    return Ok(());
                }
            }
        }
    }

    /// Size bound first, then ordering.
    fn check_frame(&mut self, frame: &FrameHeader) -> Result<(), DecryptError> {
        if let Some(max) = self.max_body_size {
            if frame.content_length > max {
                warn!(declared = frame.content_length, max, "frame exceeds max body size");
                return Err(DecryptError::BodySizeExceeded { declared: frame.content_length, max });
            }
        }
        if frame.sequence_number != self.next_sequence {
            warn!(expected = self.next_sequence, actual = frame.sequence_number, "sequence out of order");
            return Err(DecryptError::SequenceOutOfOrder {
                expected: self.next_sequence,
                actual: frame.sequence_number,
            });
        }
        if !frame.is_final_frame {
            self.next_sequence = self
                .next_sequence
                .checked_add(1)
                .ok_or_else(|| DecryptError::MalformedFrame("sequence number overflow".into()))?;
        }
        Ok(())
    }

    #[inline]
    fn hand_off(&mut self, bytes: &[u8]) {
        if let Some(signature) = self.signature.as_mut() {
            signature.update(bytes);
        }
    }

    async fn flush(&mut self, output: &mut mpsc::Sender<VerifierMessage>) -> Result<(), DecryptError> {
        let phase = std::mem::replace(&mut self.phase, VerifyPhase::AwaitingFrameHeader);
        let final_tag = match phase {
            VerifyPhase::AwaitingSignatureTail { final_tag } => final_tag,
            VerifyPhase::AwaitingFrameHeader if self.buffer.is_empty() => {
                return Err(DecryptError::IncompleteMessage("no final frame"))
            }
            VerifyPhase::AwaitingFrameHeader => {
                return Err(DecryptError::IncompleteMessage("input ended inside a frame header"))
            }
            VerifyPhase::AccumulatingContent { .. } => {
                return Err(DecryptError::IncompleteMessage("input ended inside frame content"))
            }
            VerifyPhase::AwaitingTag { .. } => {
                return Err(DecryptError::IncompleteMessage("input ended before the frame tag"))
            }
        };

        if let Some(signature) = self.signature.take() {
            let started = Instant::now();
            let footer = std::mem::take(&mut self.buffer);
            let der = deserialize_signature_info(&footer)?
                .ok_or(DecryptError::IncompleteMessage("missing or truncated signature"))?;
            self.counters.add_signature(footer.len());
            signature.verify(der).map_err(|e| {
                warn!(error = %e, "message signature rejected");
                DecryptError::from(e)
            })?;
            self.counters.add_stage_time(Stage::Verify, started.elapsed());
            debug!("message signature verified");
        }

        let (ack, done) = oneshot::channel();
        send(output, VerifierMessage::AuthTag { tag: final_tag, ack }).await?;
        done.await
            .map_err(|_| DecryptError::Pipeline("decipher stage dropped final acknowledgement"))?;
        debug!(frames = self.counters.frames_data + self.counters.frames_final, "message body complete");
        Ok(())
    }
}

async fn send(output: &mut mpsc::Sender<VerifierMessage>, message: VerifierMessage) -> Result<(), DecryptError> {
    output
        .send(message)
        .await
        .map_err(|_| DecryptError::Pipeline("decipher stage closed"))
}
