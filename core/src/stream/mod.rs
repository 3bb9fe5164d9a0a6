//! stream/mod.rs
//! Streaming authenticated decryption: three stages on one cooperative task.
//!
//! HeaderParser → FrameVerifier → FrameDecipher, with a frame-complete ack
//! flowing back from the decipher stage to the verifier.

pub mod core;
pub mod frame_decipher;
pub mod frame_verifier;
pub mod framing;
pub mod header_parser;
pub mod io;
pub mod messages;
pub mod pipeline;

pub use self::core::*;
pub use self::pipeline::DecryptStream;
