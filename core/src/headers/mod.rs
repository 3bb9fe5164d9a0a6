// ## src/headers/mod.rs

//! headers/mod.rs
//! Message header model, incremental decoder and serializer.
//!
//! Industry notes:
//! - Never trust header fields before the header tag verifies; the parser stage
//!   authenticates before anything downstream sees them.
//! - Format version selects layout: v1 carries a 16-byte message id and header IV,
//!   v2 a 32-byte message id plus key commitment.

pub mod types;
pub mod encode;
pub mod decode;

pub use types::*;
pub use encode::*;
pub use decode::*;
