// ## src/telemetry/snapshot.rs

//! src/telemetry/snapshot.rs
//!
//! Immutable telemetry snapshot taken when a decrypt stream completes.
//!
//! Design notes:
//! - Built once from merged stage counters and the stream timer.
//! - Serializable so callers can log or export it as-is.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::DecryptCounters;
use crate::telemetry::timers::{StageTimes, TelemetryTimer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub frames_data: u64,
    pub frames_final: u64,
    pub bytes_header: u64,
    pub bytes_ciphertext: u64,
    pub bytes_plaintext: u64,
    pub bytes_overhead: u64,
    pub bytes_signature: u64,
    pub throughput_plaintext_bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
    /// Captured plaintext when decrypting into `OutputSink::Memory`.
    #[serde(skip)]
    pub output: Option<Vec<u8>>,
}

impl TelemetrySnapshot {
    pub fn from(counters: &DecryptCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_plaintext as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            frames_data: counters.frames_data,
            frames_final: counters.frames_final,
            bytes_header: counters.bytes_header,
            bytes_ciphertext: counters.bytes_ciphertext,
            bytes_plaintext: counters.bytes_plaintext,
            bytes_overhead: counters.bytes_overhead,
            bytes_signature: counters.bytes_signature,
            throughput_plaintext_bytes_per_sec: throughput,
            elapsed,
            stage_times: counters.stage_times.clone(),
            output: None,
        }
    }

    /// Total ciphertext message length accounted for.
    pub fn input_bytes(&self) -> u64 {
        self.bytes_header + self.bytes_ciphertext + self.bytes_overhead + self.bytes_signature
    }

    /// Validates internal invariants: AES-GCM is length preserving.
    pub fn sanity_check(&self) -> bool {
        self.bytes_plaintext == self.bytes_ciphertext && self.stage_times.total() <= self.elapsed
    }

    pub fn attach_output(&mut self, buf: Vec<u8>) {
        self.output = Some(buf);
    }
}
