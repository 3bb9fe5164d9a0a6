//! crypto/suite.rs
//! Algorithm suite registry and the policy gates applied to it.
//!
//! Design notes:
//! - Suite ids are a closed registry; unknown ids never reach key derivation.
//! - Every property the pipeline branches on (key length, KDF, signature curve,
//!   commitment, message format) is answered here so stages never match on raw ids.

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::constants::{MESSAGE_FORMAT_V1, MESSAGE_FORMAT_V2};
use crate::crypto::types::{COMMITMENT_LEN, IV_LEN_12, TAG_LEN};

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum AlgorithmSuiteId {
    Aes128GcmIv12Tag16NoKdf = 0x0014,
    Aes192GcmIv12Tag16NoKdf = 0x0046,
    Aes256GcmIv12Tag16NoKdf = 0x0078,
    Aes128GcmIv12Tag16HkdfSha256 = 0x0114,
    Aes192GcmIv12Tag16HkdfSha256 = 0x0146,
    Aes256GcmIv12Tag16HkdfSha256 = 0x0178,
    Aes128GcmIv12Tag16HkdfSha256EcdsaP256 = 0x0214,
    Aes192GcmIv12Tag16HkdfSha384EcdsaP384 = 0x0346,
    Aes256GcmIv12Tag16HkdfSha384EcdsaP384 = 0x0378,
    Aes256GcmHkdfSha512CommitKey = 0x0478,
    Aes256GcmHkdfSha512CommitKeyEcdsaP384 = 0x0578,
}

/// Key derivation function bound to a suite.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KdfKind {
    /// Data key is used directly.
    Identity,
    HkdfSha256,
    HkdfSha384,
    HkdfSha512,
}

/// Signature curve; the digest is SHA-256 for P-256 and SHA-384 for P-384.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignatureCurve {
    P256,
    P384,
}

impl SignatureCurve {
    /// Longest DER encoding of an ECDSA signature on this curve.
    pub const fn max_der_len(self) -> usize {
        match self {
            SignatureCurve::P256 => 72,
            SignatureCurve::P384 => 104,
        }
    }
}

/// Resolved suite properties.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AlgorithmSuite {
    pub id: AlgorithmSuiteId,
    pub message_format: u8,
    pub key_len: usize,
    pub iv_len: usize,
    pub tag_len: usize,
    pub kdf: KdfKind,
    pub signature: Option<SignatureCurve>,
    pub commitment_len: usize,
}

impl AlgorithmSuite {
    pub fn from_raw(raw: u16) -> Option<Self> {
        AlgorithmSuiteId::try_from_primitive(raw).ok().map(Self::new)
    }

    pub fn new(id: AlgorithmSuiteId) -> Self {
        use AlgorithmSuiteId::*;
        let (key_len, kdf, signature) = match id {
            Aes128GcmIv12Tag16NoKdf => (16, KdfKind::Identity, None),
            Aes192GcmIv12Tag16NoKdf => (24, KdfKind::Identity, None),
            Aes256GcmIv12Tag16NoKdf => (32, KdfKind::Identity, None),
            Aes128GcmIv12Tag16HkdfSha256 => (16, KdfKind::HkdfSha256, None),
            Aes192GcmIv12Tag16HkdfSha256 => (24, KdfKind::HkdfSha256, None),
            Aes256GcmIv12Tag16HkdfSha256 => (32, KdfKind::HkdfSha256, None),
            Aes128GcmIv12Tag16HkdfSha256EcdsaP256 => (16, KdfKind::HkdfSha256, Some(SignatureCurve::P256)),
            Aes192GcmIv12Tag16HkdfSha384EcdsaP384 => (24, KdfKind::HkdfSha384, Some(SignatureCurve::P384)),
            Aes256GcmIv12Tag16HkdfSha384EcdsaP384 => (32, KdfKind::HkdfSha384, Some(SignatureCurve::P384)),
            Aes256GcmHkdfSha512CommitKey => (32, KdfKind::HkdfSha512, None),
            Aes256GcmHkdfSha512CommitKeyEcdsaP384 => (32, KdfKind::HkdfSha512, Some(SignatureCurve::P384)),
        };
        let committing = matches!(id, Aes256GcmHkdfSha512CommitKey | Aes256GcmHkdfSha512CommitKeyEcdsaP384);

        Self {
            id,
            message_format: if committing { MESSAGE_FORMAT_V2 } else { MESSAGE_FORMAT_V1 },
            key_len,
            iv_len: IV_LEN_12,
            tag_len: TAG_LEN,
            kdf,
            signature,
            commitment_len: if committing { COMMITMENT_LEN } else { 0 },
        }
    }

    pub fn raw(&self) -> u16 {
        self.id as u16
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn is_committing(&self) -> bool {
        self.commitment_len > 0
    }
}

/// Which suites may be used for encrypt and decrypt.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitmentPolicy {
    ForbidEncryptAllowDecrypt,
    RequireEncryptAllowDecrypt,
    #[default]
    RequireEncryptRequireDecrypt,
}

impl CommitmentPolicy {
    pub fn permits_decrypt(&self, suite: &AlgorithmSuite) -> bool {
        match self {
            CommitmentPolicy::ForbidEncryptAllowDecrypt
            | CommitmentPolicy::RequireEncryptAllowDecrypt => true,
            CommitmentPolicy::RequireEncryptRequireDecrypt => suite.is_committing(),
        }
    }
}

/// Whether signed suites may be decrypted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignaturePolicy {
    #[default]
    AllowEncryptAllowDecrypt,
    AllowEncryptForbidDecrypt,
}

impl SignaturePolicy {
    pub fn permits_decrypt(&self, suite: &AlgorithmSuite) -> bool {
        match self {
            SignaturePolicy::AllowEncryptAllowDecrypt => true,
            SignaturePolicy::AllowEncryptForbidDecrypt => !suite.is_signed(),
        }
    }
}
