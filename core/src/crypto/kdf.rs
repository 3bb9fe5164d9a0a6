// ## src/crypto/kdf.rs

//! crypto/kdf.rs
//! Per-message key schedule derived from the plaintext data key.
//!
//! Design:
//! - Non-KDF suites use the data key directly.
//! - v1 HKDF suites: HKDF-Expand(PRK(salt = none, ikm = data key), info = suite id ‖ message id).
//! - Committing suites: HKDF-SHA512 with the message id as salt, one expansion for
//!   the content key ("DERIVEKEY") and one for the key commitment ("COMMITKEY").
//!
//! Security notes:
//! - Derived keys live in `Zeroizing` buffers and are wiped on drop.
//! - Commitment is compared in constant time.

use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::constants::{COMMIT_KEY_LABEL, DERIVE_KEY_LABEL};
use crate::crypto::suite::{AlgorithmSuite, KdfKind};
use crate::crypto::types::{CryptoError, COMMITMENT_LEN};

/// Derive the content key for one message.
///
/// For committing suites `commitment` must carry the header suite data; it is
/// checked against the derived commitment before the content key is returned.
pub fn derive_message_key(
    suite: &AlgorithmSuite,
    data_key: &[u8],
    message_id: &[u8],
    commitment: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if data_key.len() != suite.key_len {
        return Err(CryptoError::InvalidKeyLen { expected: suite.key_len, actual: data_key.len() });
    }

    let suite_id = suite.raw().to_be_bytes();
    let mut key = Zeroizing::new(vec![0u8; suite.key_len]);

    match suite.kdf {
        KdfKind::Identity => key.copy_from_slice(data_key),
        KdfKind::HkdfSha256 => {
            let info = [&suite_id[..], message_id].concat();
            Hkdf::<Sha256>::new(None, data_key)
                .expand(&info, key.as_mut_slice())
                .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed (SHA-256)"))?;
        }
        KdfKind::HkdfSha384 => {
            let info = [&suite_id[..], message_id].concat();
            Hkdf::<Sha384>::new(None, data_key)
                .expand(&info, key.as_mut_slice())
                .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed (SHA-384)"))?;
        }
        KdfKind::HkdfSha512 => {
            let hk = Hkdf::<Sha512>::new(Some(message_id), data_key);

            let mut derived_commitment = [0u8; COMMITMENT_LEN];
            hk.expand(COMMIT_KEY_LABEL, &mut derived_commitment)
                .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed (commit key)"))?;
            verify_commitment(&derived_commitment, commitment)?;

            let info = [&suite_id[..], DERIVE_KEY_LABEL].concat();
            hk.expand(&info, key.as_mut_slice())
                .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed (SHA-512)"))?;
        }
    }

    Ok(key)
}

/// Commitment value for a committing suite (used when serializing v2 headers).
pub fn derive_commitment(data_key: &[u8], message_id: &[u8]) -> Result<[u8; COMMITMENT_LEN], CryptoError> {
    let mut commitment = [0u8; COMMITMENT_LEN];
    Hkdf::<Sha512>::new(Some(message_id), data_key)
        .expand(COMMIT_KEY_LABEL, &mut commitment)
        .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed (commit key)"))?;
    Ok(commitment)
}

fn verify_commitment(derived: &[u8], expected: &[u8]) -> Result<(), CryptoError> {
    if derived.len() != expected.len() || derived.ct_eq(expected).unwrap_u8() != 1 {
        return Err(CryptoError::CommitmentMismatch);
    }
    Ok(())
}
