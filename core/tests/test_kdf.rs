// Key schedule checks:

// * identity suites use the data key as-is
// * HKDF suites bind the suite id and message id
// * committing suites verify the header commitment before any key is released
// * wrong-length data keys are rejected up front

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use envelope_core::crypto::{
        derive_commitment, derive_message_key, AlgorithmSuite, AlgorithmSuiteId, CryptoError, KdfKind,
    };
    use envelope_core::types::DecryptError;

    fn suite(id: AlgorithmSuiteId) -> AlgorithmSuite {
        AlgorithmSuite::new(id)
    }

    #[test]
    fn identity_kdf_returns_data_key() {
        let s = suite(AlgorithmSuiteId::Aes128GcmIv12Tag16NoKdf);
        assert_eq!(s.kdf, KdfKind::Identity);
        let data_key = [5u8; 16];
        let key = derive_message_key(&s, &data_key, &[1; 16], &[]).unwrap();
        assert_eq!(key.as_slice(), &data_key);
    }

    #[test]
    fn hkdf_depends_on_message_id() {
        let s = suite(AlgorithmSuiteId::Aes256GcmIv12Tag16HkdfSha256);
        let data_key = [9u8; 32];
        let k1 = derive_message_key(&s, &data_key, &[1; 16], &[]).unwrap();
        let k2 = derive_message_key(&s, &data_key, &[2; 16], &[]).unwrap();
        assert_ne!(k1, k2);
        assert_eq!(k1.len(), 32);
    }

    #[test]
    fn hkdf_depends_on_suite_id() {
        let a = suite(AlgorithmSuiteId::Aes128GcmIv12Tag16HkdfSha256);
        let b = suite(AlgorithmSuiteId::Aes128GcmIv12Tag16HkdfSha256EcdsaP256);
        let data_key = [3u8; 16];
        let ka = derive_message_key(&a, &data_key, &[7; 16], &[]).unwrap();
        let kb = derive_message_key(&b, &data_key, &[7; 16], &[]).unwrap();
        assert_ne!(ka, kb);
    }

    #[test]
    fn sha384_suite_derives_its_key_length() {
        let s = suite(AlgorithmSuiteId::Aes192GcmIv12Tag16HkdfSha384EcdsaP384);
        assert_eq!(s.kdf, KdfKind::HkdfSha384);
        let key = derive_message_key(&s, &[1u8; 24], &[0; 16], &[]).unwrap();
        assert_eq!(key.len(), 24);
    }

    #[test]
    fn wrong_data_key_length_is_rejected() {
        let s = suite(AlgorithmSuiteId::Aes256GcmIv12Tag16HkdfSha256);
        let err = derive_message_key(&s, &[0u8; 16], &[0; 16], &[]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyLen { expected: 32, actual: 16 }));
        assert!(matches!(DecryptError::from(err), DecryptError::MaterialsResolutionFailure(_)));
    }

    #[test]
    fn committing_suite_accepts_matching_commitment() {
        let s = suite(AlgorithmSuiteId::Aes256GcmHkdfSha512CommitKey);
        assert!(s.is_committing());
        let data_key = [4u8; 32];
        let message_id = [8u8; 32];
        let commitment = derive_commitment(&data_key, &message_id).unwrap();
        let key = derive_message_key(&s, &data_key, &message_id, &commitment).unwrap();
        assert_eq!(key.len(), 32);
        assert_ne!(key.as_slice(), &data_key);
    }

    #[test]
    fn committing_suite_rejects_wrong_commitment() {
        let s = suite(AlgorithmSuiteId::Aes256GcmHkdfSha512CommitKey);
        let data_key = [4u8; 32];
        let message_id = [8u8; 32];
        let mut commitment = derive_commitment(&data_key, &message_id).unwrap();
        commitment[31] ^= 1;
        let err = derive_message_key(&s, &data_key, &message_id, &commitment).unwrap_err();
        assert!(matches!(err, CryptoError::CommitmentMismatch));
        assert!(matches!(DecryptError::from(err), DecryptError::KeyCommitmentMismatch));
    }

    #[test]
    fn committing_suite_rejects_truncated_commitment() {
        let s = suite(AlgorithmSuiteId::Aes256GcmHkdfSha512CommitKeyEcdsaP384);
        let data_key = [4u8; 32];
        let message_id = [8u8; 32];
        let commitment = derive_commitment(&data_key, &message_id).unwrap();
        let err = derive_message_key(&s, &data_key, &message_id, &commitment[..16]).unwrap_err();
        assert!(matches!(err, CryptoError::CommitmentMismatch));
    }

    proptest! {
        #[test]
        fn derivation_is_deterministic(data_key in proptest::array::uniform32(any::<u8>()),
                                       message_id in proptest::array::uniform32(any::<u8>())) {
            let s = suite(AlgorithmSuiteId::Aes256GcmHkdfSha512CommitKey);
            let commitment = derive_commitment(&data_key, &message_id).unwrap();
            let k1 = derive_message_key(&s, &data_key, &message_id, &commitment).unwrap();
            let k2 = derive_message_key(&s, &data_key, &message_id, &commitment).unwrap();
            prop_assert_eq!(k1, k2);
        }
    }
}
