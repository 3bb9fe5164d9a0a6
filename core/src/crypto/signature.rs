//! crypto/signature.rs
//! Whole-message ECDSA verification and the trailing signature footer.
//!
//! Design notes:
//! - The verifier hashes incrementally; stages feed it bytes as they hand them off.
//! - Footer wire format: [ signature_len: u16 BE ][ DER signature ].
//! - P-256 pairs with SHA-256, P-384 with SHA-384.

use byteorder::{BigEndian, ByteOrder};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use sha2::{Digest as _, Sha256, Sha384};

use crate::crypto::suite::SignatureCurve;
use crate::crypto::types::CryptoError;

/// Internal hashing state.
enum DigestState {
    Sha256(Sha256),
    Sha384(Sha384),
}

impl DigestState {
    #[inline]
    fn update(&mut self, data: &[u8]) {
        match self {
            DigestState::Sha256(h) => h.update(data),
            DigestState::Sha384(h) => h.update(data),
        }
    }

    #[inline]
    fn finalize(self) -> Vec<u8> {
        match self {
            DigestState::Sha256(h) => h.finalize().to_vec(),
            DigestState::Sha384(h) => h.finalize().to_vec(),
        }
    }
}

enum VerifyingKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

/// Running signature accumulator bound to one verification key.
pub struct SignatureVerifier {
    curve: SignatureCurve,
    state: DigestState,
    key: VerifyingKey,
    bytes_hashed: u64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("curve", &self.curve)
            .field("bytes_hashed", &self.bytes_hashed)
            .finish()
    }
}

impl SignatureVerifier {
    /// Build a verifier from a SEC1-encoded (compressed or uncompressed) public key.
    pub fn new(curve: SignatureCurve, sec1_key: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |e: p256::ecdsa::Error| CryptoError::InvalidVerificationKey(format!("{:?} key: {}", curve, e));
        let (state, key) = match curve {
            SignatureCurve::P256 => (
                DigestState::Sha256(Sha256::new()),
                VerifyingKey::P256(p256::ecdsa::VerifyingKey::from_sec1_bytes(sec1_key).map_err(invalid)?),
            ),
            SignatureCurve::P384 => (
                DigestState::Sha384(Sha384::new()),
                VerifyingKey::P384(p384::ecdsa::VerifyingKey::from_sec1_bytes(sec1_key).map_err(invalid)?),
            ),
        };
        Ok(Self { curve, state, key, bytes_hashed: 0 })
    }

    pub fn curve(&self) -> SignatureCurve {
        self.curve
    }

    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
        self.bytes_hashed += data.len() as u64;
    }

    /// Consume the verifier and check a DER signature over everything hashed so far.
    pub fn verify(self, der_signature: &[u8]) -> Result<(), CryptoError> {
        let digest = self.state.finalize();
        let malformed = |e: p256::ecdsa::Error| CryptoError::MalformedSignature(e.to_string());
        match self.key {
            VerifyingKey::P256(key) => {
                let sig = p256::ecdsa::Signature::from_der(der_signature).map_err(malformed)?;
                key.verify_prehash(&digest, &sig).map_err(|_| CryptoError::SignatureMismatch)
            }
            VerifyingKey::P384(key) => {
                let sig = p384::ecdsa::Signature::from_der(der_signature).map_err(malformed)?;
                key.verify_prehash(&digest, &sig).map_err(|_| CryptoError::SignatureMismatch)
            }
        }
    }
}

/// Largest footer this curve can legitimately produce.
pub fn max_signature_footer_len(curve: SignatureCurve) -> usize {
    2 + curve.max_der_len()
}

/// Try to read the footer from `buf`.
///
/// Returns `Ok(None)` while more bytes are needed, and an error once `buf`
/// holds bytes past the declared signature.
pub fn deserialize_signature_info(buf: &[u8]) -> Result<Option<&[u8]>, CryptoError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let sig_len = BigEndian::read_u16(&buf[..2]) as usize;
    if sig_len == 0 {
        return Err(CryptoError::MalformedSignature("empty signature".into()));
    }
    let end = 2 + sig_len;
    if buf.len() < end {
        return Ok(None);
    }
    if buf.len() > end {
        return Err(CryptoError::MalformedSignature(format!(
            "{} trailing bytes after signature",
            buf.len() - end
        )));
    }
    Ok(Some(&buf[2..end]))
}

/// Footer encoding: [ signature_len: u16 BE ][ signature ].
pub fn serialize_signature_info(signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + signature.len());
    out.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    out.extend_from_slice(signature);
    out
}
