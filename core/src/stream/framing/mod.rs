//! stream/framing/mod.rs
//! Body frame headers: decoding for the verifier, encoding for message construction.

pub mod types;
pub mod encode;
pub mod decode;

pub use types::*;
pub use encode::*;
pub use decode::*;
