// ## 📂 File: `src/stream/pipeline.rs`
// ## Pure pipeline wiring (no crypto logic)

//! Composes HeaderParser → FrameVerifier → FrameDecipher on one task.
//!
//! Design notes:
//! - The three stages are plain async fns joined with `try_join!`; the first error
//!   wins and drops the others (and with them any buffered, unreleased state).
//! - Channels are bounded, so a slow consumer suspends the decipher stage, which
//!   holds the verifier's ack, which stops the verifier reading. No internal growth.
//! - `DecryptStream` polls the driver and then the plaintext channel. Plaintext that
//!   was authenticated before a failure is still yielded before the error.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use tracing::{debug, warn};

use crate::headers::types::MessageHeader;
use crate::materials::DecryptionMaterialsResolver;
use crate::stream::core::DecryptConfig;
use crate::stream::frame_decipher::FrameDecipher;
use crate::stream::frame_verifier::FrameVerifier;
use crate::stream::header_parser::HeaderParser;
use crate::telemetry::{DecryptCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::DecryptError;

/// Build the stage graph and return the driver future plus its outputs.
pub fn run_decrypt_pipeline<S>(
    resolver: Arc<dyn DecryptionMaterialsResolver>,
    config: &DecryptConfig,
    input: S,
) -> (
    BoxFuture<'static, Result<DecryptCounters, DecryptError>>,
    mpsc::Receiver<Bytes>,
    oneshot::Receiver<MessageHeader>,
)
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    // ---- Channels ----
    let capacity = config.channel_capacity;
    let (header_stage_tx, header_stage_rx) = mpsc::channel(capacity);
    let (verifier_tx, verifier_rx) = mpsc::channel(capacity);
    let (plaintext_tx, plaintext_rx) = mpsc::channel(capacity);
    let (header_tx, header_rx) = oneshot::channel();

    // ---- Stages ----
    let parser = HeaderParser::new(
        resolver,
        config.commitment_policy,
        config.signature_policy,
        config.max_encrypted_data_keys,
    );
    let verifier = FrameVerifier::new(config.max_body_size);
    let decipher = FrameDecipher::new();

    let driver = async move {
        let (mut counters, verified, deciphered) = futures::try_join!(
            parser.run(input, header_stage_tx, header_tx),
            verifier.run(header_stage_rx, verifier_tx),
            decipher.run(verifier_rx, plaintext_tx),
        )?;
        counters += verified;
        counters += deciphered;
        Ok(counters)
    }
    .boxed();

    (driver, plaintext_rx, header_rx)
}

/// Plaintext stream returned by `decrypt_stream`.
///
/// Yields authenticated plaintext chunks in order and ends with `None` on success or
/// with a single `Err` on failure.
pub struct DecryptStream {
    driver: Option<BoxFuture<'static, Result<DecryptCounters, DecryptError>>>,
    plaintext: mpsc::Receiver<Bytes>,
    header_rx: Option<oneshot::Receiver<MessageHeader>>,
    header: Option<MessageHeader>,
    failure: Option<DecryptError>,
    telemetry: Option<TelemetrySnapshot>,
    timer: TelemetryTimer,
    finished: bool,
}

impl DecryptStream {
    pub(crate) fn new<S>(resolver: Arc<dyn DecryptionMaterialsResolver>, config: &DecryptConfig, input: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let (driver, plaintext, header_rx) = run_decrypt_pipeline(resolver, config, input);
        Self {
            driver: Some(driver),
            plaintext,
            header_rx: Some(header_rx),
            header: None,
            failure: None,
            telemetry: None,
            timer: TelemetryTimer::new(),
            finished: false,
        }
    }

    /// The authenticated header, once the header stage has emitted it.
    pub fn message_header(&mut self) -> Option<&MessageHeader> {
        if self.header.is_none() {
            if let Some(rx) = self.header_rx.as_mut() {
                match rx.try_recv() {
                    Ok(Some(header)) => {
                        self.header = Some(header);
                        self.header_rx = None;
                    }
                    Ok(None) => {}
                    Err(_) => self.header_rx = None,
                }
            }
        }
        self.header.as_ref()
    }

    /// Counters and timings, available once the stream completed successfully.
    pub fn telemetry(&self) -> Option<&TelemetrySnapshot> {
        self.telemetry.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn poll_driver(&mut self, cx: &mut Context<'_>) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };
        if let Poll::Ready(result) = driver.poll_unpin(cx) {
            self.driver = None;
            match result {
                Ok(counters) => {
                    let snapshot = TelemetrySnapshot::from(&counters, &self.timer);
                    debug!(
                        plaintext = snapshot.bytes_plaintext,
                        frames = snapshot.frames_data + snapshot.frames_final,
                        "decrypt stream complete"
                    );
                    self.telemetry = Some(snapshot);
                }
                Err(e) => {
                    warn!(error = %e, "decrypt stream failed");
                    self.failure = Some(e);
                }
            }
        }
    }
}

impl Stream for DecryptStream {
    type Item = Result<Bytes, DecryptError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        this.poll_driver(cx);

        match this.plaintext.poll_next_unpin(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
            // Sender is gone but the driver has not resolved yet; it was just polled.
            Poll::Ready(None) if this.driver.is_some() => Poll::Pending,
            Poll::Ready(None) => {
                this.finished = true;
                match this.failure.take() {
                    Some(e) => Poll::Ready(Some(Err(e))),
                    None => Poll::Ready(None),
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
