//! envelope-core
//!
//! Streaming authenticated decryption for envelope-encrypted messages.
//! Parses the self-describing message format, authenticates it frame by frame
//! (optionally under a whole-message ECDSA signature), and releases plaintext
//! only after each frame verifies.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;

pub mod crypto;
pub mod headers;
pub mod materials;
pub mod telemetry;

// Stream layers
pub mod stream;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::crypto::suite::{AlgorithmSuite, AlgorithmSuiteId, CommitmentPolicy, SignaturePolicy};
    pub use crate::headers::types::{EncryptedDataKey, EncryptionContext, MessageHeader};
    pub use crate::materials::{
        DecryptMaterialsRequest, DecryptionMaterials, DecryptionMaterialsResolver, ResolverError,
    };
    pub use crate::stream::io::{InputSource, OutputSink};
    pub use crate::stream::{decrypt, decrypt_blocking, decrypt_stream, DecryptConfig, DecryptOutput, DecryptStream, DecryptSummary};
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::types::DecryptError;
}
