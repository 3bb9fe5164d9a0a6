// ### `src/telemetry/counters.rs`

//! telemetry/counters.rs
//! Mutable counters used during the decrypt pipeline.
//!
//! Summary: each stage owns its own counters (no locks, no atomics) and the
//! pipeline merges them with `+=` once every stage has finished.

use std::ops::AddAssign;
use std::time::Duration;

use crate::telemetry::timers::{Stage, StageTimes};

/// Deterministic counters collected during stream processing
#[derive(Default, Clone, Debug, PartialEq)]
pub struct DecryptCounters {
    pub frames_data: u64,
    pub frames_final: u64,
    pub bytes_header: u64,
    pub bytes_ciphertext: u64,
    pub bytes_plaintext: u64,
    /// Frame headers and tags.
    pub bytes_overhead: u64,
    pub bytes_signature: u64,
    pub stage_times: StageTimes,
}

impl DecryptCounters {
    /// Record the message header (including header auth) as consumed.
    pub fn add_header(&mut self, header_len: usize) {
        self.bytes_header += header_len as u64;
    }

    /// Record one decoded frame header.
    pub fn add_frame(&mut self, is_final: bool, frame_header_len: usize) {
        if is_final {
            self.frames_final += 1;
        } else {
            self.frames_data += 1;
        }
        self.bytes_overhead += frame_header_len as u64;
    }

    pub fn add_ciphertext(&mut self, len: usize) {
        self.bytes_ciphertext += len as u64;
    }

    pub fn add_tag(&mut self, len: usize) {
        self.bytes_overhead += len as u64;
    }

    pub fn add_signature(&mut self, len: usize) {
        self.bytes_signature += len as u64;
    }

    pub fn add_plaintext(&mut self, len: usize) {
        self.bytes_plaintext += len as u64;
    }

    pub fn add_stage_time(&mut self, stage: Stage, dur: Duration) {
        self.stage_times.add(stage, dur);
    }
}

impl AddAssign for DecryptCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.frames_data      += rhs.frames_data;
        self.frames_final     += rhs.frames_final;

        self.bytes_header     += rhs.bytes_header;
        self.bytes_ciphertext += rhs.bytes_ciphertext;
        self.bytes_plaintext  += rhs.bytes_plaintext;
        self.bytes_overhead   += rhs.bytes_overhead;
        self.bytes_signature  += rhs.bytes_signature;

        for (stage, dur) in rhs.stage_times {
            self.stage_times.add(stage, dur);
        }
    }
}
