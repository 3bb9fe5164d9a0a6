//! materials.rs
//! Boundary to the external decryption materials resolver.
//!
//! Design notes:
//! - The resolver is the only suspension point before header authentication; the
//!   pipeline owns whatever it returns until the stream ends.
//! - `MaterialsGuard` disposes exactly once: explicitly at stream end, or on drop
//!   when the stream errors or is abandoned. A guard is only created once materials
//!   were actually obtained, so an early abort has nothing to dispose.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::BoxFuture;
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::constants::ENCODED_SIGNER_KEY;
use crate::crypto::suite::{AlgorithmSuite, AlgorithmSuiteId};
use crate::headers::types::{EncryptedDataKey, EncryptionContext};

/// What the pipeline hands to the resolver.
#[derive(Debug, Clone)]
pub struct DecryptMaterialsRequest {
    pub suite: AlgorithmSuite,
    pub encryption_context: EncryptionContext,
    pub encrypted_data_keys: Vec<EncryptedDataKey>,
}

/// Resolver failure, propagated unchanged as `MaterialsResolutionFailure`.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ResolverError(pub String);

/// Resolves the plaintext data key for one message.
pub trait DecryptionMaterialsResolver: Send + Sync {
    fn decrypt_materials(
        &self,
        request: DecryptMaterialsRequest,
    ) -> BoxFuture<'_, Result<DecryptionMaterials, ResolverError>>;
}

type DisposeHook = Box<dyn FnOnce() + Send>;

/// Resolved materials. The data key is wiped when dropped.
pub struct DecryptionMaterials {
    pub suite_id: AlgorithmSuiteId,
    data_key: Zeroizing<Vec<u8>>,
    verification_key: Option<Vec<u8>>,
    on_dispose: Option<DisposeHook>,
}

impl fmt::Debug for DecryptionMaterials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionMaterials")
            .field("suite_id", &self.suite_id)
            .field("data_key", &"<redacted>")
            .field("verification_key", &self.verification_key.as_ref().map(hex::encode))
            .finish()
    }
}

impl DecryptionMaterials {
    pub fn new(suite_id: AlgorithmSuiteId, data_key: Vec<u8>) -> Self {
        Self { suite_id, data_key: Zeroizing::new(data_key), verification_key: None, on_dispose: None }
    }

    /// SEC1-encoded public key for signed suites.
    pub fn with_verification_key(mut self, key: Vec<u8>) -> Self {
        self.verification_key = Some(key);
        self
    }

    /// Extra teardown run when the pipeline disposes these materials.
    pub fn with_dispose_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    pub fn suite(&self) -> AlgorithmSuite {
        AlgorithmSuite::new(self.suite_id)
    }

    pub fn data_key(&self) -> &[u8] {
        &self.data_key
    }

    pub fn verification_key(&self) -> Option<&[u8]> {
        self.verification_key.as_deref()
    }
}

/// Owns materials for the stream's lifetime and disposes them exactly once.
#[derive(Debug, Default)]
pub struct MaterialsGuard {
    inner: Option<DecryptionMaterials>,
}

impl MaterialsGuard {
    pub fn new(materials: DecryptionMaterials) -> Self {
        Self { inner: Some(materials) }
    }

    pub fn get(&self) -> Option<&DecryptionMaterials> {
        self.inner.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_none()
    }

    /// Wipe the data key and run the dispose hook. No-op after the first call.
    pub fn dispose(&mut self) {
        if let Some(mut materials) = self.inner.take() {
            materials.data_key.zeroize();
            if let Some(hook) = materials.on_dispose.take() {
                hook();
            }
            debug!(suite = ?materials.suite_id, "decryption materials disposed");
        }
    }
}

impl Drop for MaterialsGuard {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Decode the verification key a signing producer published in the encryption context.
pub fn verification_key_from_context(context: &EncryptionContext) -> Result<Option<Vec<u8>>, ResolverError> {
    context
        .get(ENCODED_SIGNER_KEY)
        .map(|encoded| {
            STANDARD
                .decode(encoded)
                .map_err(|e| ResolverError(format!("invalid {}: {}", ENCODED_SIGNER_KEY, e)))
        })
        .transpose()
}
