//! Shared helpers for integration tests: a message producer mirroring the wire
//! format, a counting resolver, and chunked drivers.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use p256::ecdsa::signature::hazmat::PrehashSigner;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha384};

use envelope_core::constants::{ENCODED_SIGNER_KEY, MESSAGE_ID_LEN_V1, MESSAGE_ID_LEN_V2};
use envelope_core::crypto::{
    build_frame_aad, derive_commitment, derive_message_key, serialize_signature_info, AeadImpl, AlgorithmSuite,
    AlgorithmSuiteId, CommitmentPolicy, SignatureCurve,
};
use envelope_core::headers::{
    serialize_header_auth, serialize_message_header, ContentType, EncryptedDataKey, EncryptionContext,
    MessageFormat, MessageHeader,
};
use envelope_core::materials::{
    verification_key_from_context, DecryptMaterialsRequest, DecryptionMaterials, DecryptionMaterialsResolver,
    ResolverError,
};
use envelope_core::stream::framing::{
    frame_iv, serialize_final_frame_header, serialize_frame_header, serialize_non_framed_body_header,
};
use envelope_core::stream::{decrypt_stream, DecryptConfig};
use envelope_core::types::DecryptError;

pub const UNSIGNED_V1: AlgorithmSuiteId = AlgorithmSuiteId::Aes256GcmIv12Tag16HkdfSha256;
pub const SIGNED_P256: AlgorithmSuiteId = AlgorithmSuiteId::Aes128GcmIv12Tag16HkdfSha256EcdsaP256;
pub const SIGNED_P384: AlgorithmSuiteId = AlgorithmSuiteId::Aes256GcmIv12Tag16HkdfSha384EcdsaP384;
pub const COMMITTING: AlgorithmSuiteId = AlgorithmSuiteId::Aes256GcmHkdfSha512CommitKey;
pub const COMMITTING_SIGNED: AlgorithmSuiteId = AlgorithmSuiteId::Aes256GcmHkdfSha512CommitKeyEcdsaP384;

pub const ALL_SUITES: [AlgorithmSuiteId; 11] = [
    AlgorithmSuiteId::Aes128GcmIv12Tag16NoKdf,
    AlgorithmSuiteId::Aes192GcmIv12Tag16NoKdf,
    AlgorithmSuiteId::Aes256GcmIv12Tag16NoKdf,
    AlgorithmSuiteId::Aes128GcmIv12Tag16HkdfSha256,
    AlgorithmSuiteId::Aes192GcmIv12Tag16HkdfSha256,
    AlgorithmSuiteId::Aes256GcmIv12Tag16HkdfSha256,
    AlgorithmSuiteId::Aes128GcmIv12Tag16HkdfSha256EcdsaP256,
    AlgorithmSuiteId::Aes192GcmIv12Tag16HkdfSha384EcdsaP384,
    AlgorithmSuiteId::Aes256GcmIv12Tag16HkdfSha384EcdsaP384,
    AlgorithmSuiteId::Aes256GcmHkdfSha512CommitKey,
    AlgorithmSuiteId::Aes256GcmHkdfSha512CommitKeyEcdsaP384,
];

/// What to produce.
#[derive(Debug, Clone)]
pub struct MessagePlan {
    pub suite: AlgorithmSuiteId,
    /// 0 produces a non-framed body.
    pub frame_length: u32,
    pub encryption_context: EncryptionContext,
    /// Sequence numbers written per frame, in order; defaults to 1, 2, 3, ...
    pub sequence_numbers: Option<Vec<u32>>,
}

impl MessagePlan {
    pub fn framed(suite: AlgorithmSuiteId, frame_length: u32) -> Self {
        let mut encryption_context = EncryptionContext::new();
        encryption_context.insert("purpose".into(), "integration-test".into());
        Self { suite, frame_length, encryption_context, sequence_numbers: None }
    }

    pub fn non_framed(suite: AlgorithmSuiteId) -> Self {
        Self { frame_length: 0, ..Self::framed(suite, 0) }
    }
}

/// Byte ranges of one frame inside the message.
#[derive(Debug, Clone, Copy)]
pub struct FrameLayout {
    pub start: usize,
    pub content_start: usize,
    pub tag_start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct BuiltMessage {
    pub bytes: Vec<u8>,
    pub data_key: Vec<u8>,
    pub header_len: usize,
    /// Offset of the header auth tag.
    pub header_tag_start: usize,
    pub frames: Vec<FrameLayout>,
    /// Start of the signature footer for signed suites.
    pub signature_start: Option<usize>,
}

enum Signer {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl Signer {
    fn new(curve: SignatureCurve) -> Self {
        match curve {
            SignatureCurve::P256 => Signer::P256(p256::ecdsa::SigningKey::from_slice(&[0x17; 32]).unwrap()),
            SignatureCurve::P384 => Signer::P384(p384::ecdsa::SigningKey::from_slice(&[0x17; 48]).unwrap()),
        }
    }

    fn public_key(&self) -> Vec<u8> {
        match self {
            Signer::P256(k) => k.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            Signer::P384(k) => k.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Signer::P256(k) => {
                let digest = Sha256::digest(message);
                let sig: p256::ecdsa::Signature = k.sign_prehash(&digest).unwrap();
                sig.to_der().as_bytes().to_vec()
            }
            Signer::P384(k) => {
                let digest = Sha384::digest(message);
                let sig: p384::ecdsa::Signature = k.sign_prehash(&digest).unwrap();
                sig.to_der().as_bytes().to_vec()
            }
        }
    }
}

/// Encrypt `plaintext` into a complete message.
pub fn build_message(plaintext: &[u8], plan: &MessagePlan) -> BuiltMessage {
    let suite = AlgorithmSuite::new(plan.suite);
    let mut rng = rand::thread_rng();

    let version = if suite.message_format == 2 { MessageFormat::V2 } else { MessageFormat::V1 };
    let mut message_id = vec![0u8; if version == MessageFormat::V2 { MESSAGE_ID_LEN_V2 } else { MESSAGE_ID_LEN_V1 }];
    rng.fill_bytes(&mut message_id);
    let mut data_key = vec![0u8; suite.key_len];
    rng.fill_bytes(&mut data_key);

    // 1️⃣ Header
    let signer = suite.signature.map(Signer::new);
    let mut encryption_context = plan.encryption_context.clone();
    if let Some(signer) = &signer {
        encryption_context.insert(ENCODED_SIGNER_KEY.into(), STANDARD.encode(signer.public_key()));
    }
    let suite_data = if suite.is_committing() {
        derive_commitment(&data_key, &message_id).unwrap().to_vec()
    } else {
        Vec::new()
    };
    let content_type = if plan.frame_length == 0 { ContentType::NonFramed } else { ContentType::Framed };
    let header = MessageHeader {
        version,
        suite_id: plan.suite,
        message_id: message_id.clone(),
        encryption_context,
        encrypted_data_keys: vec![EncryptedDataKey {
            provider_id: "test-provider".into(),
            provider_info: b"key-info".to_vec(),
            encrypted_data_key: b"wrapped-data-key".to_vec(),
        }],
        content_type,
        frame_length: plan.frame_length,
        suite_data: suite_data.clone(),
        raw_header: Bytes::new(),
        header_iv: Vec::new(),
        header_auth_tag: Vec::new(),
    };
    let raw_header = serialize_message_header(&header).unwrap();

    let key = derive_message_key(&suite, &data_key, &message_id, &suite_data).unwrap();
    let cipher = AeadImpl::new(&suite, &key).unwrap();
    let header_iv = vec![0u8; suite.iv_len];
    let header_tag = cipher.seal_in_place(&header_iv, &raw_header, &mut []).unwrap();

    let mut out = raw_header.clone();
    let header_tag_start = out.len() + if version == MessageFormat::V1 { suite.iv_len } else { 0 };
    out.extend_from_slice(&serialize_header_auth(version, &header_iv, &header_tag));
    let header_len = out.len();

    // 2️⃣ Body
    let mut frames = Vec::new();
    let mut seal = |out: &mut Vec<u8>, frame_header: Vec<u8>, iv: &[u8], aad: Vec<u8>, content: &[u8]| {
        let start = out.len();
        out.extend_from_slice(&frame_header);
        let content_start = out.len();
        let mut buf = content.to_vec();
        let tag = cipher.seal_in_place(iv, &aad, &mut buf).unwrap();
        out.extend_from_slice(&buf);
        let tag_start = out.len();
        out.extend_from_slice(&tag);
        frames.push(FrameLayout { start, content_start, tag_start, end: out.len() });
    };

    match content_type {
        ContentType::NonFramed => {
            let iv = frame_iv(suite.iv_len, 1);
            let aad = build_frame_aad(&message_id, content_type, true, 1, plaintext.len() as u64);
            let frame_header = serialize_non_framed_body_header(&iv, plaintext.len() as u64);
            seal(&mut out, frame_header, &iv, aad, plaintext);
        }
        ContentType::Framed => {
            let chunks: Vec<&[u8]> = if plaintext.is_empty() {
                vec![&[][..]]
            } else {
                plaintext.chunks(plan.frame_length as usize).collect()
            };
            let last = chunks.len() - 1;
            for (i, chunk) in chunks.into_iter().enumerate() {
                let seq = plan
                    .sequence_numbers
                    .as_ref()
                    .and_then(|s| s.get(i).copied())
                    .unwrap_or(i as u32 + 1);
                let is_final = i == last;
                let iv = frame_iv(suite.iv_len, seq);
                let aad = build_frame_aad(&message_id, content_type, is_final, seq, chunk.len() as u64);
                let frame_header = if is_final {
                    serialize_final_frame_header(seq, &iv, chunk.len() as u32)
                } else {
                    serialize_frame_header(seq, &iv)
                };
                seal(&mut out, frame_header, &iv, aad, chunk);
            }
        }
    }

    // 3️⃣ Signature
    let signature_start = signer.map(|signer| {
        let start = out.len();
        let der = signer.sign(&out);
        out.extend_from_slice(&serialize_signature_info(&der));
        start
    });

    BuiltMessage { bytes: out, data_key, header_len, header_tag_start, frames, signature_start }
}

/// Resolver handing out one fixed data key, counting calls and disposals.
#[derive(Clone)]
pub struct TestResolver {
    pub data_key: Vec<u8>,
    pub suite_override: Option<AlgorithmSuiteId>,
    pub fail_with: Option<String>,
    pub calls: Arc<AtomicUsize>,
    pub disposals: Arc<AtomicUsize>,
}

impl TestResolver {
    pub fn new(data_key: Vec<u8>) -> Self {
        Self {
            data_key,
            suite_override: None,
            fail_with: None,
            calls: Arc::new(AtomicUsize::new(0)),
            disposals: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn for_message(message: &BuiltMessage) -> Self {
        Self::new(message.data_key.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

impl DecryptionMaterialsResolver for TestResolver {
    fn decrypt_materials(
        &self,
        request: DecryptMaterialsRequest,
    ) -> BoxFuture<'_, Result<DecryptionMaterials, ResolverError>> {
        let this = self.clone();
        async move {
            this.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = this.fail_with {
                return Err(ResolverError(msg));
            }
            let suite_id = this.suite_override.unwrap_or(request.suite.id);
            let disposals = this.disposals.clone();
            let mut materials = DecryptionMaterials::new(suite_id, this.data_key.clone())
                .with_dispose_hook(move || {
                    disposals.fetch_add(1, Ordering::SeqCst);
                });
            if let Some(key) = verification_key_from_context(&request.encryption_context)? {
                materials = materials.with_verification_key(key);
            }
            Ok(materials)
        }
        .boxed()
    }
}

/// Config accepting every suite.
pub fn permissive_config() -> DecryptConfig {
    DecryptConfig { commitment_policy: CommitmentPolicy::RequireEncryptAllowDecrypt, ..DecryptConfig::default() }
}

/// Outcome of a driven stream: everything released, and the terminal error if any.
#[derive(Debug)]
pub struct RunOutcome {
    pub plaintext: Vec<u8>,
    pub error: Option<DecryptError>,
    pub chunks_released: usize,
}

/// Feed `chunks` through the pipeline and drain it to completion.
pub fn run_chunks(resolver: &TestResolver, config: &DecryptConfig, chunks: Vec<Vec<u8>>) -> RunOutcome {
    let input = futures::stream::iter(chunks.into_iter().map(|c| Ok::<_, io::Error>(Bytes::from(c))));
    let mut stream = decrypt_stream(Arc::new(resolver.clone()), config, input).unwrap();

    futures::executor::block_on(async {
        let mut outcome = RunOutcome { plaintext: Vec::new(), error: None, chunks_released: 0 };
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    outcome.chunks_released += 1;
                    outcome.plaintext.extend_from_slice(&chunk);
                }
                Err(e) => {
                    assert!(outcome.error.is_none(), "stream yielded more than one error");
                    outcome.error = Some(e);
                }
            }
        }
        outcome
    })
}

pub fn run_whole(resolver: &TestResolver, config: &DecryptConfig, bytes: &[u8]) -> RunOutcome {
    run_chunks(resolver, config, vec![bytes.to_vec()])
}

pub fn run_bytewise(resolver: &TestResolver, config: &DecryptConfig, bytes: &[u8]) -> RunOutcome {
    run_chunks(resolver, config, bytes.iter().map(|b| vec![*b]).collect())
}

/// Deterministic plaintext of `len` bytes.
pub fn plaintext(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

/// Short description of an error kind for cross-run comparison.
pub fn kind(error: &Option<DecryptError>) -> String {
    match error {
        None => "ok".into(),
        Some(e) => format!("{:?}", e).split(['(', ' ', '{']).next().unwrap_or_default().to_string(),
    }
}
