
// ## `core.rs` — stable public API

use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_READ_CHUNK_SIZE};
use crate::crypto::suite::{CommitmentPolicy, SignaturePolicy};
use crate::headers::types::MessageHeader;
use crate::materials::DecryptionMaterialsResolver;
use crate::stream::io::{input_stream, open_output, InputSource, OutputSink};
use crate::stream::pipeline::DecryptStream;
use crate::telemetry::TelemetrySnapshot;
use crate::types::DecryptError;

/// Caller-facing decrypt configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptConfig {
    /// Caps any single frame's declared content length.
    pub max_body_size: Option<u64>,
    pub commitment_policy: CommitmentPolicy,
    pub signature_policy: SignaturePolicy,
    /// Caps the encrypted data key count in the header.
    pub max_encrypted_data_keys: Option<u16>,
    /// Bound for every inter-stage channel, in messages.
    pub channel_capacity: usize,
    /// Read size used by `decrypt_blocking`.
    pub read_chunk_size: usize,
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            max_body_size: None,
            commitment_policy: CommitmentPolicy::default(),
            signature_policy: SignaturePolicy::default(),
            max_encrypted_data_keys: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl DecryptConfig {
    pub fn validate(&self) -> Result<(), DecryptError> {
        if self.max_body_size == Some(0) {
            return Err(DecryptError::InvalidConfiguration("max_body_size must be positive".into()));
        }
        if self.max_encrypted_data_keys == Some(0) {
            return Err(DecryptError::InvalidConfiguration("max_encrypted_data_keys must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(DecryptError::InvalidConfiguration("channel_capacity must be positive".into()));
        }
        if self.read_chunk_size == 0 {
            return Err(DecryptError::InvalidConfiguration("read_chunk_size must be positive".into()));
        }
        Ok(())
    }
}

/// Result of the one-shot `decrypt`.
#[derive(Debug, Clone)]
pub struct DecryptOutput {
    pub plaintext: Vec<u8>,
    pub header: MessageHeader,
    pub telemetry: TelemetrySnapshot,
}

/// Result of `decrypt_blocking`.
#[derive(Debug, Clone)]
pub struct DecryptSummary {
    pub header: MessageHeader,
    pub telemetry: TelemetrySnapshot,
}

/// 🔓 Streaming decrypt over any chunked byte stream.
pub fn decrypt_stream<S>(
    resolver: Arc<dyn DecryptionMaterialsResolver>,
    config: &DecryptConfig,
    input: S,
) -> Result<DecryptStream, DecryptError>
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    config.validate()?;
    Ok(DecryptStream::new(resolver, config, input))
}

/// 🔓 One-shot decrypt of a complete message held in memory.
pub async fn decrypt(
    resolver: Arc<dyn DecryptionMaterialsResolver>,
    config: &DecryptConfig,
    ciphertext: impl Into<Bytes>,
) -> Result<DecryptOutput, DecryptError> {
    let ciphertext: Bytes = ciphertext.into();
    let input = futures::stream::iter([Ok::<_, io::Error>(ciphertext)]);
    let mut stream = decrypt_stream(resolver, config, input)?;

    let mut plaintext = Vec::new();
    while let Some(chunk) = stream.next().await {
        plaintext.extend_from_slice(&chunk?);
    }

    let header = stream
        .message_header()
        .cloned()
        .ok_or(DecryptError::Pipeline("stream completed without a header"))?;
    let telemetry = stream
        .telemetry()
        .cloned()
        .ok_or(DecryptError::Pipeline("stream completed without telemetry"))?;
    Ok(DecryptOutput { plaintext, header, telemetry })
}

/// 🔓 Blocking decrypt from a reader/file/memory into a writer/file/memory.
///
/// Plaintext is written frame by frame as it authenticates; on error the sink may
/// hold the plaintext of frames that verified before the failure.
pub fn decrypt_blocking(
    resolver: Arc<dyn DecryptionMaterialsResolver>,
    config: &DecryptConfig,
    input: InputSource,
    output: OutputSink,
) -> Result<DecryptSummary, DecryptError> {
    config.validate()?;
    let input = input_stream(input, config.read_chunk_size)?;
    let (mut writer, maybe_buf) = open_output(output)?;

    let mut stream = decrypt_stream(resolver, config, input)?;
    pollster::block_on(async {
        while let Some(chunk) = stream.next().await {
            writer.write_all(&chunk?)?;
        }
        writer.flush()?;
        Ok::<_, DecryptError>(())
    })?;

    let header = stream
        .message_header()
        .cloned()
        .ok_or(DecryptError::Pipeline("stream completed without a header"))?;
    let mut telemetry = stream
        .telemetry()
        .cloned()
        .ok_or(DecryptError::Pipeline("stream completed without telemetry"))?;

    // --- Memory sink capture ---
    if let Some(buf) = maybe_buf {
        let captured = buf
            .lock()
            .map_err(|_| DecryptError::Pipeline("output buffer poisoned"))?
            .clone();
        telemetry.attach_output(captured);
    }
    debug!(bytes = telemetry.bytes_plaintext, "blocking decrypt finished");

    Ok(DecryptSummary { header, telemetry })
}
