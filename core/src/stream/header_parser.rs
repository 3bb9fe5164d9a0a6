//! stream/header_parser.rs
//! Stage 1: buffer until a header decodes, resolve materials, authenticate, then pass through.
//!
//! Design notes:
//! - Phase is explicit (`ParsingHeader | PassThrough`); once the header has been handled
//!   every later chunk is forwarded untouched and header decoding never runs again.
//! - "Not enough bytes yet" is not an error. Only EOF in `ParsingHeader` is (`IncompleteHeader`).
//! - Policy gates run on the declared suite before the resolver is called, and again on the
//!   suite the resolver hands back.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures::channel::{mpsc, oneshot};
use futures::{pin_mut, SinkExt, Stream, StreamExt};
use tracing::{debug, trace, warn};

use crate::crypto::aead::AeadImpl;
use crate::crypto::kdf::derive_message_key;
use crate::crypto::signature::SignatureVerifier;
use crate::crypto::suite::{AlgorithmSuite, CommitmentPolicy, SignaturePolicy};
use crate::headers::decode::{deserialize_message_header, HeaderDecodeOptions};
use crate::headers::types::MessageHeader;
use crate::materials::{DecryptMaterialsRequest, DecryptionMaterials, DecryptionMaterialsResolver, MaterialsGuard};
use crate::stream::framing::BodyLayout;
use crate::stream::messages::{DecipherInfo, HeaderStageMessage, VerifyInfo};
use crate::telemetry::{DecryptCounters, Stage};
use crate::types::DecryptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsePhase {
    ParsingHeader,
    PassThrough,
}

pub struct HeaderParser {
    resolver: Arc<dyn DecryptionMaterialsResolver>,
    commitment_policy: CommitmentPolicy,
    signature_policy: SignaturePolicy,
    decode_options: HeaderDecodeOptions,
    phase: ParsePhase,
    buffer: BytesMut,
    counters: DecryptCounters,
}

impl HeaderParser {
    pub fn new(
        resolver: Arc<dyn DecryptionMaterialsResolver>,
        commitment_policy: CommitmentPolicy,
        signature_policy: SignaturePolicy,
        max_encrypted_data_keys: Option<u16>,
    ) -> Self {
        Self {
            resolver,
            commitment_policy,
            signature_policy,
            decode_options: HeaderDecodeOptions { max_encrypted_data_keys },
            phase: ParsePhase::ParsingHeader,
            buffer: BytesMut::new(),
            counters: DecryptCounters::default(),
        }
    }

    /// Drive the stage until `input` ends.
    ///
    /// Emits `VerifyInfo` downstream, then the public header on `header_tx`, then every
    /// remaining byte as `Chunk`s.
    pub async fn run<S>(
        mut self,
        input: S,
        mut output: mpsc::Sender<HeaderStageMessage>,
        header_tx: oneshot::Sender<MessageHeader>,
    ) -> Result<DecryptCounters, DecryptError>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        pin_mut!(input);
        let mut header_tx = Some(header_tx);

        while let Some(chunk) = input.next().await {
            let chunk = chunk?;
            match self.phase {
                ParsePhase::ParsingHeader => {
                    self.buffer.extend_from_slice(&chunk);
                    let Some((header, consumed)) = deserialize_message_header(&self.buffer, &self.decode_options)?
                    else {
                        trace!(buffered = self.buffer.len(), "header incomplete, buffering");
                        continue;
                    };

                    let verify_info = self.authenticate(&header).await?;
                    self.counters.add_header(consumed);
                    debug!(
                        message_id = %hex::encode(&header.message_id),
                        suite = ?header.suite_id,
                        content_type = ?header.content_type,
                        frame_length = header.frame_length,
                        "message header authenticated"
                    );

                    output
                        .send(HeaderStageMessage::VerifyInfo(Box::new(verify_info)))
                        .await
                        .map_err(|_| DecryptError::Pipeline("verifier stage closed"))?;
                    if let Some(tx) = header_tx.take() {
                        // Receiver may already be gone; the stream still decrypts.
                        let _ = tx.send(header);
                    }

                    self.phase = ParsePhase::PassThrough;
                    let tail = self.buffer.split_off(consumed).freeze();
                    self.buffer = BytesMut::new();
                    if !tail.is_empty() {
                        forward(&mut output, tail).await?;
                    }
                }
                ParsePhase::PassThrough => {
                    if !chunk.is_empty() {
                        forward(&mut output, chunk).await?;
                    }
                }
            }
        }

        if self.phase == ParsePhase::ParsingHeader {
            warn!(buffered = self.buffer.len(), "input ended before a complete header");
            return Err(DecryptError::IncompleteHeader);
        }
        Ok(self.counters)
    }

    fn check_policy(&self, suite: &AlgorithmSuite) -> Result<(), DecryptError> {
        if !self.commitment_policy.permits_decrypt(suite) {
            return Err(DecryptError::ConfigurationConflict(format!(
                "suite {:?} is not permitted by commitment policy {:?}",
                suite.id, self.commitment_policy
            )));
        }
        if !self.signature_policy.permits_decrypt(suite) {
            return Err(DecryptError::ConfigurationConflict(format!(
                "signed suite {:?} is not permitted by signature policy {:?}",
                suite.id, self.signature_policy
            )));
        }
        Ok(())
    }

    /// Resolve materials, derive the key schedule, and verify the header tag.
    async fn authenticate(&mut self, header: &MessageHeader) -> Result<VerifyInfo, DecryptError> {
        let suite = header.suite();
        self.check_policy(&suite)?;

        // 1️⃣ Resolve (suspension point)
        let started = Instant::now();
        let request = DecryptMaterialsRequest {
            suite,
            encryption_context: header.encryption_context.clone(),
            encrypted_data_keys: header.encrypted_data_keys.clone(),
        };
        let materials = self
            .resolver
            .decrypt_materials(request)
            .await
            .map_err(|e| DecryptError::MaterialsResolutionFailure(e.to_string()))?;
        self.counters.add_stage_time(Stage::ResolveMaterials, started.elapsed());

        // From here on the guard disposes on every exit path.
        let materials = MaterialsGuard::new(materials);
        let resolved = materials
            .get()
            .ok_or(DecryptError::MalformedState("materials disposed before use"))?;
        self.check_materials(&suite, resolved)?;

        // 2️⃣ Key schedule
        let started = Instant::now();
        let key = derive_message_key(&suite, resolved.data_key(), &header.message_id, &header.suite_data)?;
        let cipher = AeadImpl::new(&suite, &key)?;

        // 3️⃣ Header authentication
        cipher
            .verify_header(&header.header_iv, &header.raw_header, &header.header_auth_tag)
            .map_err(|_| {
                warn!(message_id = %hex::encode(&header.message_id), "header authentication failed");
                DecryptError::HeaderAuthenticationFailure
            })?;
        self.counters.add_stage_time(Stage::HeaderAuth, started.elapsed());

        // 4️⃣ Signature accumulator starts with the header itself
        let signature = match (suite.signature, resolved.verification_key()) {
            (Some(curve), Some(public_key)) => {
                let mut verifier = SignatureVerifier::new(curve, public_key)?;
                verifier.update(&header.raw_header);
                verifier.update(&header.header_auth_bytes());
                Some(verifier)
            }
            _ => None,
        };

        Ok(VerifyInfo {
            layout: BodyLayout::from_header(header),
            signature,
            decipher: DecipherInfo {
                message_id: header.message_id.clone(),
                content_type: header.content_type,
                cipher: Arc::new(cipher),
                materials,
            },
        })
    }

    fn check_materials(&self, suite: &AlgorithmSuite, materials: &DecryptionMaterials) -> Result<(), DecryptError> {
        let resolved = materials.suite();
        self.check_policy(&resolved)?;
        if resolved.id != suite.id {
            return Err(DecryptError::MaterialsResolutionFailure(format!(
                "resolved suite {:?} does not match header suite {:?}",
                resolved.id, suite.id
            )));
        }
        match (suite.is_signed(), materials.verification_key().is_some()) {
            (true, false) => Err(DecryptError::MaterialsResolutionFailure(
                "signed suite resolved without a verification key".into(),
            )),
            (false, true) => Err(DecryptError::MaterialsResolutionFailure(
                "unsigned suite resolved with a verification key".into(),
            )),
            _ => Ok(()),
        }
    }
}

async fn forward(output: &mut mpsc::Sender<HeaderStageMessage>, chunk: Bytes) -> Result<(), DecryptError> {
    output
        .send(HeaderStageMessage::Chunk(chunk))
        .await
        .map_err(|_| DecryptError::Pipeline("verifier stage closed"))
}
