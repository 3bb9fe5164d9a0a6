//! crypto/mod.rs
//! Suite registry, key schedule, AEAD and signature primitives.

pub mod types;
pub mod suite;
pub mod aad;
pub mod aead;
pub mod kdf;
pub mod signature;

pub use types::*;
pub use suite::*;
pub use aad::*;
pub use aead::*;
pub use kdf::*;
pub use signature::*;
