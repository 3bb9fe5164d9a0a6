// ## 📂 File: `src/crypto/aead.rs`

//! src/crypto/aead.rs
//! AEAD interface for the AES-GCM family used by every algorithm suite.
//!
//! Design notes:
//! - Key size is chosen by the suite (128/192/256); IV is 12 bytes and tag 16 bytes throughout.
//! - Tags are detached on the wire, so all operations are the `*_in_place_detached` variants.
//! - Tag verification is constant-time and fails closed: a `FrameCipher` returns no plaintext
//!   unless the whole frame authenticates.

use std::sync::Arc;

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use bytes::{Bytes, BytesMut};

use crate::crypto::suite::AlgorithmSuite;
use crate::crypto::types::{CryptoError, IV_LEN_12, TAG_LEN};

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Unified AEAD cipher implementation selected by the suite key length.
#[derive(Clone)]
pub enum AeadImpl {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl std::fmt::Debug for AeadImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AeadImpl::Aes128(_) => "Aes128Gcm",
            AeadImpl::Aes192(_) => "Aes192Gcm",
            AeadImpl::Aes256(_) => "Aes256Gcm",
        };
        f.write_str(name)
    }
}

impl AeadImpl {
    /// Construct the AEAD from the suite and a derived content key.
    pub fn new(suite: &AlgorithmSuite, key: &[u8]) -> Result<Self, CryptoError> {
        let invalid = || CryptoError::InvalidKeyLen { expected: suite.key_len, actual: key.len() };
        if key.len() != suite.key_len {
            return Err(invalid());
        }

        match suite.key_len {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128).map_err(|_| invalid()),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192).map_err(|_| invalid()),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    /// Encrypt `buffer` in place and return the detached tag.
    pub fn seal_in_place(&self, iv: &[u8], aad: &[u8], buffer: &mut [u8]) -> Result<[u8; TAG_LEN], CryptoError> {
        check_iv(iv)?;
        let nonce = GenericArray::from_slice(iv);
        let tag = match self {
            AeadImpl::Aes128(c) => c.encrypt_in_place_detached(nonce, aad, buffer),
            AeadImpl::Aes192(c) => c.encrypt_in_place_detached(nonce, aad, buffer),
            AeadImpl::Aes256(c) => c.encrypt_in_place_detached(nonce, aad, buffer),
        }
        .map_err(|_| CryptoError::SealFailed)?;

        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    /// Decrypt `buffer` in place after verifying the detached tag.
    pub fn open_in_place(&self, iv: &[u8], aad: &[u8], buffer: &mut [u8], tag: &[u8]) -> Result<(), CryptoError> {
        check_iv(iv)?;
        if tag.len() != TAG_LEN {
            return Err(CryptoError::InvalidTagLen { expected: TAG_LEN, actual: tag.len() });
        }
        let nonce = GenericArray::from_slice(iv);
        let tag = GenericArray::from_slice(tag);
        match self {
            AeadImpl::Aes128(c) => c.decrypt_in_place_detached(nonce, aad, buffer, tag),
            AeadImpl::Aes192(c) => c.decrypt_in_place_detached(nonce, aad, buffer, tag),
            AeadImpl::Aes256(c) => c.decrypt_in_place_detached(nonce, aad, buffer, tag),
        }
        .map_err(|_| CryptoError::TagMismatch)
    }

    /// Header authentication: zero-length plaintext, raw header bytes as AAD.
    pub fn verify_header(&self, iv: &[u8], header: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
        self.open_in_place(iv, header, &mut [], tag)
    }
}

fn check_iv(iv: &[u8]) -> Result<(), CryptoError> {
    if iv.len() != IV_LEN_12 {
        return Err(CryptoError::InvalidIvLen { expected: IV_LEN_12, actual: iv.len() });
    }
    Ok(())
}

/// Per-frame decryption context bound to one IV and one AAD.
///
/// Ciphertext chunks are buffered as they arrive and their boundaries recorded.
/// `finalize` authenticates the whole frame and hands the plaintext back split on
/// the same boundaries, so downstream sees the chunking the producer saw.
#[derive(Debug)]
pub struct FrameCipher {
    cipher: Arc<AeadImpl>,
    iv: Vec<u8>,
    aad: Vec<u8>,
    buffer: BytesMut,
    boundaries: Vec<usize>,
}

impl FrameCipher {
    pub fn new(cipher: Arc<AeadImpl>, iv: &[u8], aad: Vec<u8>) -> Result<Self, CryptoError> {
        check_iv(iv)?;
        Ok(Self { cipher, iv: iv.to_vec(), aad, buffer: BytesMut::new(), boundaries: Vec::new() })
    }

    pub fn update(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(chunk);
        self.boundaries.push(self.buffer.len());
    }

    /// Verify `tag` and return the plaintext chunks in arrival order.
    pub fn finalize(mut self, tag: &[u8]) -> Result<Vec<Bytes>, CryptoError> {
        self.cipher.open_in_place(&self.iv, &self.aad, &mut self.buffer, tag)?;

        let mut plaintext = self.buffer.freeze();
        let mut start = 0usize;
        let mut chunks = Vec::with_capacity(self.boundaries.len());
        for end in self.boundaries {
            chunks.push(plaintext.split_to(end - start));
            start = end;
        }
        Ok(chunks)
    }
}
