//! End-to-end tests driving the whole engine through its command surface.

use sks_common::authset::{AuthorizationSet, AuthorizationSetBuilder};
use sks_common::crypto::aes;
use sks_common::{hex_decode, hex_encode, keyblob, Error};
use sks_crypto_boring::{BoringRng, BoringEq};
use sks_engine::{Keystore, SystemClock, MAX_OPERATIONS};
use sks_wire::{
    Algorithm, BlockMode, Digest, EcCurve, ErrorCode, KeyFormat, KeyParam, KeyPurpose,
    OperationHandle, PaddingMode, Tag,
};

fn keystore() -> Keystore {
    Keystore::new(
        sks_crypto_boring::implementation(),
        Box::new(BoringRng),
        Box::new(SystemClock),
    )
}

fn err_code<T: std::fmt::Debug>(result: Result<T, Error>) -> ErrorCode {
    result.expect_err("expected operation to fail").code()
}

/// Run a complete operation, feeding `message` in a single update.
fn op(
    keystore: &Keystore,
    purpose: KeyPurpose,
    key_blob: &[u8],
    params: &[KeyParam],
    message: &[u8],
    signature: Option<&[u8]>,
) -> Result<(Vec<u8>, Vec<KeyParam>), Error> {
    let begin = keystore.begin(purpose, key_blob, params)?;
    let update = match keystore.update(begin.op_handle, message, params) {
        Ok(update) => update,
        Err(e) => {
            let _ = keystore.abort(begin.op_handle);
            return Err(e);
        }
    };
    assert_eq!(update.input_consumed, message.len());
    let mut output = update.output;
    let finish = keystore.finish(begin.op_handle, &[], signature, params)?;
    output.extend_from_slice(&finish.output);
    Ok((output, finish.params))
}

fn sign_message(
    keystore: &Keystore,
    key_blob: &[u8],
    params: &[KeyParam],
    message: &[u8],
) -> Result<Vec<u8>, Error> {
    op(keystore, KeyPurpose::Sign, key_blob, params, message, None).map(|(sig, _)| sig)
}

fn verify_message(
    keystore: &Keystore,
    key_blob: &[u8],
    params: &[KeyParam],
    message: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    op(keystore, KeyPurpose::Verify, key_blob, params, message, Some(signature)).map(|_| ())
}

fn get_nonce(params: &[KeyParam]) -> Vec<u8> {
    match params.iter().find(|p| p.tag() == Tag::Nonce) {
        Some(KeyParam::Nonce(n)) => n.clone(),
        _ => panic!("no nonce in output params"),
    }
}

fn get_aead_tag(params: &[KeyParam]) -> Vec<u8> {
    match params.iter().find(|p| p.tag() == Tag::AeadTag) {
        Some(KeyParam::AeadTag(t)) => t.clone(),
        _ => panic!("no AEAD tag in output params"),
    }
}

#[test]
fn test_generated_key_has_provenance_tags() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let sw_enforced = AuthorizationSet(result.characteristics.sw_enforced.clone());
    assert!(result.characteristics.hw_enforced.is_empty());
    assert!(sw_enforced.contains_tag(Tag::Origin));
    assert!(sw_enforced.contains_tag(Tag::CreationDatetime));
    assert!(sw_enforced.contains(&KeyParam::Origin(sks_wire::KeyOrigin::Generated)));

    // The blob carries the same characteristics.
    let chars = keystore.get_key_characteristics(&result.key_blob).unwrap();
    assert_eq!(chars.sw_enforced, result.characteristics.sw_enforced);
}

#[test]
fn test_rsa_pss_sign_verify_round_trip() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .rsa_signing_key(512, 3)
                .digest(Digest::Sha256)
                .padding(PaddingMode::RsaPss)
                .build(),
        )
        .unwrap();

    let params = AuthorizationSetBuilder::new()
        .digest(Digest::Sha256)
        .padding(PaddingMode::RsaPss)
        .build();
    let message = vec![b'a'; 1024];
    let signature = sign_message(&keystore, &result.key_blob, &params, &message).unwrap();
    assert_eq!(signature.len(), 64);

    verify_message(&keystore, &result.key_blob, &params, &message, &signature).unwrap();

    // Corrupting the signature must fail verification at finish.
    let mut bad_signature = signature.clone();
    bad_signature[signature.len() / 2] ^= 0x01;
    assert_eq!(
        err_code(verify_message(&keystore, &result.key_blob, &params, &message, &bad_signature)),
        ErrorCode::VerificationFailed
    );

    // Corrupting the message must fail verification too.
    let mut bad_message = message.clone();
    bad_message[0] = b'b';
    assert_eq!(
        err_code(verify_message(&keystore, &result.key_blob, &params, &bad_message, &signature)),
        ErrorCode::VerificationFailed
    );
}

#[test]
fn test_rsa_too_short_message() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .rsa_signing_key(512, 3)
                .digest(Digest::None)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();

    let params = AuthorizationSetBuilder::new()
        .digest(Digest::None)
        .padding(PaddingMode::None)
        .build();
    // 63 bytes for a 64-byte modulus: begin and update succeed, finish fails.
    let begin = keystore.begin(KeyPurpose::Sign, &result.key_blob, &params).unwrap();
    let update = keystore.update(begin.op_handle, &[b'1'; 63], &params).unwrap();
    assert_eq!(update.input_consumed, 63);
    assert!(update.output.is_empty());
    assert_eq!(
        err_code(keystore.finish(begin.op_handle, &[], None, &params)),
        ErrorCode::UnknownError
    );
    // The operation was released on failure.
    assert_eq!(err_code(keystore.abort(begin.op_handle)), ErrorCode::InvalidOperationHandle);
}

#[test]
fn test_rsa_raw_sign_verify() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .rsa_signing_key(512, 65537)
                .digest(Digest::None)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .digest(Digest::None)
        .padding(PaddingMode::None)
        .build();
    let message = vec![b'a'; 64];
    let signature = sign_message(&keystore, &result.key_blob, &params, &message).unwrap();
    verify_message(&keystore, &result.key_blob, &params, &message, &signature).unwrap();
}

#[test]
fn test_rsa_encrypt_decrypt_oaep() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .rsa_encryption_key(1024, 65537)
                .digest(Digest::Sha256)
                .padding(PaddingMode::RsaOaep)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .digest(Digest::Sha256)
        .padding(PaddingMode::RsaOaep)
        .build();
    let message = b"counter-intuitive";

    let (ciphertext1, _) =
        op(&keystore, KeyPurpose::Encrypt, &result.key_blob, &params, message, None).unwrap();
    let (ciphertext2, _) =
        op(&keystore, KeyPurpose::Encrypt, &result.key_blob, &params, message, None).unwrap();
    // OAEP is randomized.
    assert_ne!(ciphertext1, ciphertext2);

    let (plaintext, _) =
        op(&keystore, KeyPurpose::Decrypt, &result.key_blob, &params, &ciphertext1, None).unwrap();
    assert_eq!(plaintext, message);
}

#[test]
fn test_ecdsa_sign_verify() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .ecdsa_signing_key(EcCurve::P256)
                .digest(Digest::Sha256)
                .digest(Digest::Sha512)
                .build(),
        )
        .unwrap();

    let params = AuthorizationSetBuilder::new().digest(Digest::Sha256).build();
    let message = b"an arbitrary message";
    let signature = sign_message(&keystore, &result.key_blob, &params, message).unwrap();
    verify_message(&keystore, &result.key_blob, &params, message, &signature).unwrap();

    // Verifying with a different digest fails at finish.
    let wrong_digest = AuthorizationSetBuilder::new().digest(Digest::Sha512).build();
    assert_eq!(
        err_code(verify_message(&keystore, &result.key_blob, &wrong_digest, message, &signature)),
        ErrorCode::VerificationFailed
    );
}

#[test]
fn test_ecdsa_bad_curve() {
    let keystore = keystore();
    let params = AuthorizationSetBuilder::new()
        .authorization(KeyParam::Algorithm(Algorithm::Ec))
        .authorization(KeyParam::KeySize(sks_wire::KeySizeInBits(190)))
        .authorization(KeyParam::Purpose(KeyPurpose::Sign))
        .authorization(KeyParam::Digest(Digest::None))
        .build();
    assert_eq!(err_code(keystore.generate_key(&params)), ErrorCode::UnsupportedKeySize);
}

#[test]
fn test_aes_ctr_known_answer() {
    let keystore = keystore();
    // SP 800-38A F.5.1: the counter block starts at f0f1..ff.
    let result = keystore
        .import_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ctr)
                .padding(PaddingMode::None)
                .caller_nonce()
                .build(),
            KeyFormat::Raw,
            &hex_decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap(),
        )
        .unwrap();

    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ctr)
        .padding(PaddingMode::None)
        .authorization(KeyParam::Nonce(
            hex_decode("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff").unwrap(),
        ))
        .build();
    let plaintext = hex_decode(concat!(
        "6bc1bee22e409f96e93d7e117393172a",
        "ae2d8a571e03ac9c9eb76fac45af8e51",
        "30c81c46a35ce411e5fbc1191a0a52ef",
        "f69f2445df4f9b17ad2b417be66c3710",
    ))
    .unwrap();

    let (ciphertext, _) =
        op(&keystore, KeyPurpose::Encrypt, &result.key_blob, &params, &plaintext, None).unwrap();
    assert_eq!(
        hex_encode(&ciphertext),
        concat!(
            "874d6191b620e3261bef6864990db6ce",
            "9806f66b7970fdff8617187bb9fffdff",
            "5ae4df3edbd5d35e5b4f09020db03eab",
            "1e031dda2fbe03d1792170a0f3009cee",
        )
    );

    let (recovered, _) =
        op(&keystore, KeyPurpose::Decrypt, &result.key_blob, &params, &ciphertext, None).unwrap();
    assert_eq!(recovered, plaintext);
}

#[test]
fn test_hmac_sha256_rfc4231_case2() {
    let keystore = keystore();
    let result = keystore
        .import_key(
            &AuthorizationSetBuilder::new().hmac_key(32).digest(Digest::Sha256).build(),
            KeyFormat::Raw,
            b"Jefe",
        )
        .unwrap();

    let params = AuthorizationSetBuilder::new()
        .digest(Digest::Sha256)
        .authorization(KeyParam::MacLength(256))
        .build();
    let message = b"what do ya want for nothing?";
    let mac = sign_message(&keystore, &result.key_blob, &params, message).unwrap();
    assert_eq!(
        hex_encode(&mac),
        "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );

    verify_message(&keystore, &result.key_blob, &params, message, &mac).unwrap();
    let mut bad_mac = mac.clone();
    bad_mac[3] ^= 0x40;
    assert_eq!(
        err_code(verify_message(&keystore, &result.key_blob, &params, message, &bad_mac)),
        ErrorCode::VerificationFailed
    );
}

#[test]
fn test_hmac_sha512_rfc4231_case1() {
    let keystore = keystore();
    let result = keystore
        .import_key(
            &AuthorizationSetBuilder::new().hmac_key(160).digest(Digest::Sha512).build(),
            KeyFormat::Raw,
            &[0x0b; 20],
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .digest(Digest::Sha512)
        .authorization(KeyParam::MacLength(512))
        .build();
    let mac = sign_message(&keystore, &result.key_blob, &params, b"Hi There").unwrap();
    assert_eq!(
        hex_encode(&mac),
        concat!(
            "87aa7cdea5ef619d4ff0b4241a1d6cb0",
            "2379f4e2ce4ec2787ad0b30545e17cde",
            "daa833b7d6b8a702038b274eaea3f4e4",
            "be9d914eeb61f1702e696c203a126854",
        )
    );
}

#[test]
fn test_hmac_truncated_mac() {
    let keystore = keystore();
    let result = keystore
        .generate_key(&AuthorizationSetBuilder::new().hmac_key(256).digest(Digest::Sha256).build())
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .digest(Digest::Sha256)
        .authorization(KeyParam::MacLength(128))
        .build();
    let mac = sign_message(&keystore, &result.key_blob, &params, b"data").unwrap();
    assert_eq!(mac.len(), 16);
    verify_message(&keystore, &result.key_blob, &params, b"data", &mac).unwrap();
}

#[test]
fn test_hmac_bad_mac_length() {
    let keystore = keystore();
    let result = keystore
        .generate_key(&AuthorizationSetBuilder::new().hmac_key(128).digest(Digest::Sha256).build())
        .unwrap();
    for mac_length in [264, 100] {
        let params = AuthorizationSetBuilder::new()
            .digest(Digest::Sha256)
            .authorization(KeyParam::MacLength(mac_length))
            .build();
        assert_eq!(
            err_code(keystore.begin(KeyPurpose::Sign, &result.key_blob, &params)),
            ErrorCode::UnsupportedMacLength
        );
    }
}

#[test]
fn test_aes_gcm_round_trip_and_bad_aad() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Gcm)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();

    let begin_params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Gcm)
        .padding(PaddingMode::None)
        .authorization(KeyParam::MacLength(128))
        .build();
    let aad_params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Gcm)
        .padding(PaddingMode::None)
        .authorization(KeyParam::MacLength(128))
        .authorization(KeyParam::AssociatedData(b"foobar".to_vec()))
        .build();
    let message = b"123456789012345678901234567890123456";

    // Encrypt.
    let begin = keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &begin_params).unwrap();
    let nonce = get_nonce(&begin.params);
    assert_eq!(nonce.len(), 12);
    let update = keystore.update(begin.op_handle, message, &aad_params).unwrap();
    let mut ciphertext = update.output;
    let finish = keystore.finish(begin.op_handle, &[], None, &begin_params).unwrap();
    ciphertext.extend_from_slice(&finish.output);
    let tag = get_aead_tag(&finish.params);
    assert_eq!(tag.len(), 16);

    // Decrypt with matching AAD and tag recovers the plaintext.
    let decrypt_begin_params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Gcm)
        .padding(PaddingMode::None)
        .authorization(KeyParam::MacLength(128))
        .authorization(KeyParam::Nonce(nonce.clone()))
        .build();
    let mut decrypt_params = AuthorizationSet(aad_params.to_vec());
    decrypt_params.push(KeyParam::AeadTag(tag.clone()));
    let begin =
        keystore.begin(KeyPurpose::Decrypt, &result.key_blob, &decrypt_begin_params).unwrap();
    let update = keystore.update(begin.op_handle, &ciphertext, &decrypt_params).unwrap();
    let mut plaintext = update.output;
    let finish = keystore.finish(begin.op_handle, &[], None, &decrypt_begin_params).unwrap();
    plaintext.extend_from_slice(&finish.output);
    assert_eq!(plaintext, message);

    // Decrypt with the wrong AAD fails at finish.
    let mut bad_params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Gcm)
        .padding(PaddingMode::None)
        .authorization(KeyParam::MacLength(128))
        .authorization(KeyParam::AssociatedData(b"barfoo".to_vec()))
        .build();
    bad_params.push(KeyParam::AeadTag(tag));
    let begin =
        keystore.begin(KeyPurpose::Decrypt, &result.key_blob, &decrypt_begin_params).unwrap();
    let _ = keystore.update(begin.op_handle, &ciphertext, &bad_params).unwrap();
    assert_eq!(
        err_code(keystore.finish(begin.op_handle, &[], None, &decrypt_begin_params)),
        ErrorCode::VerificationFailed
    );
}

#[test]
fn test_aes_gcm_aad_after_data_rejected() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(256)
                .block_mode(BlockMode::Gcm)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let begin_params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Gcm)
        .padding(PaddingMode::None)
        .authorization(KeyParam::MacLength(128))
        .build();
    let aad_params = AuthorizationSetBuilder::new()
        .authorization(KeyParam::AssociatedData(b"late".to_vec()))
        .build();

    let begin = keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &begin_params).unwrap();
    keystore.update(begin.op_handle, b"some data", &[]).unwrap();
    assert_eq!(
        err_code(keystore.update(begin.op_handle, b"more", &aad_params)),
        ErrorCode::InvalidTag
    );
    // The failed update destroyed the operation.
    assert_eq!(err_code(keystore.abort(begin.op_handle)), ErrorCode::InvalidOperationHandle);
}

#[test]
fn test_aes_gcm_bad_mac_length() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Gcm)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    for mac_length in [64, 100] {
        let params = AuthorizationSetBuilder::new()
            .block_mode(BlockMode::Gcm)
            .padding(PaddingMode::None)
            .authorization(KeyParam::MacLength(mac_length))
            .build();
        assert_eq!(
            err_code(keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params)),
            ErrorCode::UnsupportedMacLength
        );
    }
}

#[test]
fn test_aes_ecb_pkcs7_padding_range() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .padding(PaddingMode::Pkcs7)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ecb)
        .padding(PaddingMode::Pkcs7)
        .build();

    // Try various message lengths; all should work.
    for i in 0..32 {
        let message = vec![b'a'; i];
        let (ciphertext, _) =
            op(&keystore, KeyPurpose::Encrypt, &result.key_blob, &params, &message, None).unwrap();
        assert_eq!(ciphertext.len(), i + 16 - (i % 16));
        let (plaintext, _) =
            op(&keystore, KeyPurpose::Decrypt, &result.key_blob, &params, &ciphertext, None)
                .unwrap();
        assert_eq!(plaintext, message);
    }
}

#[test]
fn test_aes_ecb_deterministic_and_cbc_randomized() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .block_mode(BlockMode::Cbc)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let message = vec![b'm'; 32];

    let ecb_params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ecb)
        .padding(PaddingMode::None)
        .build();
    let (ct1, _) =
        op(&keystore, KeyPurpose::Encrypt, &result.key_blob, &ecb_params, &message, None).unwrap();
    let (ct2, _) =
        op(&keystore, KeyPurpose::Encrypt, &result.key_blob, &ecb_params, &message, None).unwrap();
    assert_eq!(ct1, ct2);

    // CBC with an engine-chosen nonce yields differing ciphertexts.
    let cbc_params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Cbc)
        .padding(PaddingMode::None)
        .build();
    let begin1 = keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &cbc_params).unwrap();
    let ct1 = keystore.finish(begin1.op_handle, &message, None, &[]).unwrap().output;
    let begin2 = keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &cbc_params).unwrap();
    let ct2 = keystore.finish(begin2.op_handle, &message, None, &[]).unwrap().output;
    assert_ne!(get_nonce(&begin1.params), get_nonce(&begin2.params));
    assert_ne!(ct1, ct2);
}

#[test]
fn test_aes_cbc_round_trip_with_returned_nonce() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(192)
                .block_mode(BlockMode::Cbc)
                .padding(PaddingMode::Pkcs7)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Cbc)
        .padding(PaddingMode::Pkcs7)
        .build();
    let message = b"attack at dawn";

    let begin = keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params).unwrap();
    let nonce = get_nonce(&begin.params);
    assert_eq!(nonce.len(), 16);
    let ciphertext = keystore.finish(begin.op_handle, message, None, &[]).unwrap().output;

    let mut decrypt_params = AuthorizationSet(params.to_vec());
    decrypt_params.push(KeyParam::Nonce(nonce));
    let (plaintext, _) =
        op(&keystore, KeyPurpose::Decrypt, &result.key_blob, &decrypt_params, &ciphertext, None)
            .unwrap();
    assert_eq!(plaintext, message);
}

#[test]
fn test_aes_unpadded_input_must_be_block_multiple() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ecb)
        .padding(PaddingMode::None)
        .build();
    assert_eq!(
        err_code(op(&keystore, KeyPurpose::Encrypt, &result.key_blob, &params, b"short", None)),
        ErrorCode::InvalidInputLength
    );
}

#[test]
fn test_aes_caller_nonce_gating() {
    let keystore = keystore();
    // Key without CALLER_NONCE permission.
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Cbc)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Cbc)
        .padding(PaddingMode::None)
        .authorization(KeyParam::Nonce(vec![0x11; 16]))
        .build();
    assert_eq!(
        err_code(keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params)),
        ErrorCode::CallerNonceProhibited
    );

    // Caller nonce of the wrong size is rejected even when permitted.
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Cbc)
                .padding(PaddingMode::None)
                .caller_nonce()
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Cbc)
        .padding(PaddingMode::None)
        .authorization(KeyParam::Nonce(vec![0x11; 5]))
        .build();
    assert_eq!(
        err_code(keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params)),
        ErrorCode::InvalidNonce
    );
}

#[test]
fn test_aes_ctr_rejects_padding() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ctr)
                .padding(PaddingMode::Pkcs7)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ctr)
        .padding(PaddingMode::Pkcs7)
        .build();
    assert_eq!(
        err_code(keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params)),
        ErrorCode::IncompatiblePaddingMode
    );
}

#[test]
fn test_import_parameter_mismatch() {
    let keystore = keystore();
    let rsa = openssl::rsa::Rsa::generate(1024).unwrap();
    let pkey = openssl::pkey::PKey::from_rsa(rsa).unwrap();
    let pkcs8 = pkey.private_key_to_pkcs8().unwrap();

    // Asserting the wrong key size fails.
    let params = AuthorizationSetBuilder::new().rsa_signing_key(2048, 65537).build();
    assert_eq!(
        err_code(keystore.import_key(&params, KeyFormat::Pkcs8, &pkcs8)),
        ErrorCode::ImportParameterMismatch
    );

    // Asserting the wrong exponent fails.
    let params = AuthorizationSetBuilder::new().rsa_signing_key(1024, 3).build();
    assert_eq!(
        err_code(keystore.import_key(&params, KeyFormat::Pkcs8, &pkcs8)),
        ErrorCode::ImportParameterMismatch
    );

    // Matching attributes succeed, and the import is marked as such.
    let params = AuthorizationSetBuilder::new()
        .rsa_signing_key(1024, 65537)
        .digest(Digest::Sha256)
        .padding(PaddingMode::RsaPss)
        .build();
    let result = keystore.import_key(&params, KeyFormat::Pkcs8, &pkcs8).unwrap();
    let sw_enforced = AuthorizationSet(result.characteristics.sw_enforced);
    assert!(sw_enforced.contains(&KeyParam::Origin(sks_wire::KeyOrigin::Imported)));

    // Raw import of asymmetric material is not a thing.
    let params = AuthorizationSetBuilder::new().rsa_signing_key(1024, 65537).build();
    assert_eq!(
        err_code(keystore.import_key(&params, KeyFormat::Raw, &pkcs8)),
        ErrorCode::UnsupportedKeyFormat
    );
}

#[test]
fn test_import_ec_pkcs8() {
    let keystore = keystore();
    let group =
        openssl::ec::EcGroup::from_curve_name(openssl::nid::Nid::X9_62_PRIME256V1).unwrap();
    let ec_key = openssl::ec::EcKey::generate(&group).unwrap();
    let pkey = openssl::pkey::PKey::from_ec_key(ec_key).unwrap();
    let pkcs8 = pkey.private_key_to_pkcs8().unwrap();

    // Asserting the wrong curve fails.
    let params = AuthorizationSetBuilder::new()
        .ecdsa_signing_key(EcCurve::P384)
        .digest(Digest::Sha256)
        .build();
    assert_eq!(
        err_code(keystore.import_key(&params, KeyFormat::Pkcs8, &pkcs8)),
        ErrorCode::ImportParameterMismatch
    );

    let params = AuthorizationSetBuilder::new()
        .ecdsa_signing_key(EcCurve::P256)
        .digest(Digest::Sha256)
        .build();
    let result = keystore.import_key(&params, KeyFormat::Pkcs8, &pkcs8).unwrap();

    let op_params = AuthorizationSetBuilder::new().digest(Digest::Sha256).build();
    let signature = sign_message(&keystore, &result.key_blob, &op_params, b"imported").unwrap();
    verify_message(&keystore, &result.key_blob, &op_params, b"imported", &signature).unwrap();
}

#[test]
fn test_purpose_cross_check() {
    let keystore = keystore();
    let rsa_result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .rsa_signing_key(512, 65537)
                .digest(Digest::Sha256)
                .padding(PaddingMode::RsaPkcs115Sign)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .digest(Digest::Sha256)
        .padding(PaddingMode::RsaPkcs115Sign)
        .build();
    assert_eq!(
        err_code(keystore.begin(KeyPurpose::Encrypt, &rsa_result.key_blob, &params)),
        ErrorCode::IncompatiblePurpose
    );

    let aes_result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ecb)
        .padding(PaddingMode::None)
        .build();
    assert_eq!(
        err_code(keystore.begin(KeyPurpose::Sign, &aes_result.key_blob, &params)),
        ErrorCode::IncompatiblePurpose
    );
}

#[test]
fn test_double_abort() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ecb)
        .padding(PaddingMode::None)
        .build();
    let begin = keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params).unwrap();
    keystore.abort(begin.op_handle).unwrap();
    assert_eq!(err_code(keystore.abort(begin.op_handle)), ErrorCode::InvalidOperationHandle);
    assert_eq!(
        err_code(keystore.update(begin.op_handle, b"0123456789abcdef", &[])),
        ErrorCode::InvalidOperationHandle
    );
    assert_eq!(
        err_code(keystore.finish(begin.op_handle, &[], None, &[])),
        ErrorCode::InvalidOperationHandle
    );
}

#[test]
fn test_unknown_operation_handle() {
    let keystore = keystore();
    let handle = OperationHandle(0x1234_5678_9abc_def0);
    assert_eq!(err_code(keystore.update(handle, b"data", &[])), ErrorCode::InvalidOperationHandle);
    assert_eq!(
        err_code(keystore.finish(handle, &[], None, &[])),
        ErrorCode::InvalidOperationHandle
    );
    assert_eq!(err_code(keystore.abort(handle)), ErrorCode::InvalidOperationHandle);
}

#[test]
fn test_operation_table_exhaustion() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ecb)
        .padding(PaddingMode::None)
        .build();

    let mut handles = Vec::new();
    for _i in 0..MAX_OPERATIONS {
        handles.push(
            keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params).unwrap().op_handle,
        );
    }
    assert_eq!(
        err_code(keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params)),
        ErrorCode::TooManyOperations
    );
    // Freeing one slot makes begin() work again.
    keystore.abort(handles.pop().unwrap()).unwrap();
    let begin = keystore.begin(KeyPurpose::Encrypt, &result.key_blob, &params).unwrap();
    handles.push(begin.op_handle);
    for handle in handles {
        keystore.abort(handle).unwrap();
    }
}

#[test]
fn test_tampered_blob_rejected() {
    let keystore = keystore();
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ecb)
        .padding(PaddingMode::None)
        .build();

    for idx in [1, result.key_blob.len() / 2, result.key_blob.len() - 1] {
        let mut tampered = result.key_blob.clone();
        tampered[idx] ^= 0x01;
        assert_eq!(
            err_code(keystore.begin(KeyPurpose::Encrypt, &tampered, &params)),
            ErrorCode::InvalidKeyBlob
        );
    }

    // Unknown sentinel bytes are rejected outright.
    let mut tampered = result.key_blob.clone();
    tampered[0] = 0x7f;
    assert_eq!(
        err_code(keystore.get_key_characteristics(&tampered)),
        ErrorCode::InvalidKeyBlob
    );
}

#[test]
fn test_export_formats() {
    let keystore = keystore();
    let rsa_result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .rsa_signing_key(1024, 65537)
                .digest(Digest::Sha256)
                .padding(PaddingMode::RsaPss)
                .build(),
        )
        .unwrap();
    let spki = keystore.export_key(KeyFormat::X509, &rsa_result.key_blob).unwrap();
    // Must parse as a DER SubjectPublicKeyInfo holding an RSA key.
    let pkey = openssl::pkey::PKey::public_key_from_der(&spki).unwrap();
    assert!(pkey.rsa().is_ok());
    assert_eq!(
        err_code(keystore.export_key(KeyFormat::Raw, &rsa_result.key_blob)),
        ErrorCode::UnsupportedKeyFormat
    );

    let ec_result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .ecdsa_signing_key(EcCurve::P256)
                .digest(Digest::Sha256)
                .build(),
        )
        .unwrap();
    let spki = keystore.export_key(KeyFormat::X509, &ec_result.key_blob).unwrap();
    let pkey = openssl::pkey::PKey::public_key_from_der(&spki).unwrap();
    assert!(pkey.ec_key().is_ok());

    let aes_result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(128)
                .block_mode(BlockMode::Ecb)
                .padding(PaddingMode::None)
                .build(),
        )
        .unwrap();
    assert_eq!(
        err_code(keystore.export_key(KeyFormat::X509, &aes_result.key_blob)),
        ErrorCode::UnsupportedKeyFormat
    );
}

#[test]
fn test_supported_sets() {
    let keystore = keystore();
    assert_eq!(
        keystore.get_supported_algorithms(),
        vec![Algorithm::Rsa, Algorithm::Ec, Algorithm::Aes, Algorithm::Hmac]
    );

    // RSA has no block modes but does have paddings per purpose.
    assert!(keystore
        .get_supported_block_modes(Algorithm::Rsa, KeyPurpose::Encrypt)
        .unwrap()
        .is_empty());
    assert_eq!(
        keystore.get_supported_block_modes(Algorithm::Aes, KeyPurpose::Encrypt).unwrap(),
        vec![BlockMode::Ecb, BlockMode::Cbc, BlockMode::Ctr, BlockMode::Gcm]
    );
    assert_eq!(
        err_code(keystore.get_supported_block_modes(Algorithm::Ec, KeyPurpose::Encrypt)),
        ErrorCode::UnsupportedPurpose
    );

    assert_eq!(
        keystore.get_supported_padding_modes(Algorithm::Rsa, KeyPurpose::Sign).unwrap(),
        vec![PaddingMode::None, PaddingMode::RsaPkcs115Sign, PaddingMode::RsaPss]
    );
    assert_eq!(
        keystore.get_supported_padding_modes(Algorithm::Rsa, KeyPurpose::Encrypt).unwrap(),
        vec![PaddingMode::None, PaddingMode::RsaOaep, PaddingMode::RsaPkcs115Encrypt]
    );
    assert!(keystore
        .get_supported_padding_modes(Algorithm::Ec, KeyPurpose::Sign)
        .unwrap()
        .is_empty());
    assert_eq!(
        err_code(keystore.get_supported_padding_modes(Algorithm::Aes, KeyPurpose::Sign)),
        ErrorCode::UnsupportedPurpose
    );

    let digests = keystore.get_supported_digests(Algorithm::Rsa, KeyPurpose::Sign).unwrap();
    assert!(digests.contains(&Digest::None));
    assert!(digests.contains(&Digest::Md5));
    let hmac_digests = keystore.get_supported_digests(Algorithm::Hmac, KeyPurpose::Sign).unwrap();
    assert!(!hmac_digests.contains(&Digest::None));
    assert!(!hmac_digests.contains(&Digest::Md5));
    assert_eq!(
        err_code(keystore.get_supported_digests(Algorithm::Aes, KeyPurpose::Sign)),
        ErrorCode::UnsupportedPurpose
    );

    assert_eq!(
        keystore.get_supported_import_formats(Algorithm::Rsa),
        vec![KeyFormat::Pkcs8]
    );
    assert_eq!(keystore.get_supported_import_formats(Algorithm::Aes), vec![KeyFormat::Raw]);
    assert_eq!(keystore.get_supported_export_formats(Algorithm::Ec), vec![KeyFormat::X509]);
    assert!(keystore.get_supported_export_formats(Algorithm::Hmac).is_empty());
}

#[test]
fn test_process_dispatch() {
    let keystore = keystore();
    let rsp = keystore.process(sks_wire::Request::GetSupportedAlgorithms(
        sks_wire::GetSupportedAlgorithmsRequest {},
    ));
    assert_eq!(rsp.error_code, ErrorCode::Ok);
    match rsp.rsp {
        Some(sks_wire::RspBody::GetSupportedAlgorithms(rsp)) => {
            assert_eq!(rsp.ret.len(), 4);
        }
        other => panic!("unexpected response body {:?}", other),
    }

    // Errors come back as a bare code with no body.
    let rsp = keystore.process(sks_wire::Request::GetSupportedDigests(
        sks_wire::GetSupportedDigestsRequest {
            algorithm: Algorithm::Aes,
            purpose: KeyPurpose::Sign,
        },
    ));
    assert_eq!(rsp.error_code, ErrorCode::UnsupportedPurpose);
    assert!(rsp.rsp.is_none());

    let rsp = keystore.process(sks_wire::Request::GenerateKey(sks_wire::GenerateKeyRequest {
        key_params: AuthorizationSetBuilder::new().hmac_key(128).digest(Digest::Sha256).build().0,
    }));
    assert_eq!(rsp.error_code, ErrorCode::Ok);
}

fn legacy_master_key() -> aes::Key {
    aes::Key::new(vec![0x42; 32]).unwrap()
}

/// Fabricate a legacy OCB-encrypted blob for an RSA-512 raw signing key.
fn legacy_blob(sentinel: u8) -> Vec<u8> {
    let rsa = openssl::rsa::Rsa::generate(512).unwrap();
    let key_der = rsa.private_key_to_der().unwrap();

    let hw_enforced = AuthorizationSetBuilder::new()
        .rsa_signing_key(512, 65537)
        .digest(Digest::None)
        .padding(PaddingMode::None)
        .build();
    let sw_enforced = AuthorizationSetBuilder::new().no_auth_required().build();
    keyblob::legacy::encrypt(
        &sks_crypto_boring::BoringAes,
        &mut BoringRng,
        &legacy_master_key(),
        sentinel,
        hw_enforced,
        sw_enforced,
        &key_der,
    )
    .unwrap()
    .serialize()
}

#[test]
fn test_legacy_software_blob_migrates_without_delegation() {
    let keystore = Keystore::new(
        sks_crypto_boring::implementation(),
        Box::new(BoringRng),
        Box::new(SystemClock),
    )
    .with_master_key(legacy_master_key())
    .with_subordinate(sks_crypto_boring::implementation());

    let blob = legacy_blob(b'P');
    let params = AuthorizationSetBuilder::new()
        .digest(Digest::None)
        .padding(PaddingMode::None)
        .build();
    let message = vec![b'a'; 64];
    let signature = sign_message(&keystore, &blob, &params, &message).unwrap();
    verify_message(&keystore, &blob, &params, &message, &signature).unwrap();

    // Software-legacy keys never hit the subordinate backend.
    assert_eq!(keystore.delegated_call_count(), 0);
}

#[test]
fn test_legacy_hardware_blob_delegates() {
    let keystore = Keystore::new(
        sks_crypto_boring::implementation(),
        Box::new(BoringRng),
        Box::new(SystemClock),
    )
    .with_master_key(legacy_master_key())
    .with_subordinate(sks_crypto_boring::implementation());

    let blob = legacy_blob(b'Q');

    // Policy tags from the delegated blob surface as hardware-enforced.
    let chars = keystore.get_key_characteristics(&blob).unwrap();
    let hw_enforced = AuthorizationSet(chars.hw_enforced);
    assert!(hw_enforced.contains(&KeyParam::Algorithm(Algorithm::Rsa)));
    assert!(hw_enforced.contains(&KeyParam::KeySize(sks_wire::KeySizeInBits(512))));
    assert_eq!(keystore.delegated_call_count(), 1);

    let params = AuthorizationSetBuilder::new()
        .digest(Digest::None)
        .padding(PaddingMode::None)
        .build();
    let message = vec![b'a'; 64];
    let signature = sign_message(&keystore, &blob, &params, &message).unwrap();
    verify_message(&keystore, &blob, &params, &message, &signature).unwrap();
    // begin/update/finish for each of sign and verify.
    assert_eq!(keystore.delegated_call_count(), 7);

    // Policy is still enforced by the engine for delegated keys.
    assert_eq!(
        err_code(keystore.begin(KeyPurpose::Encrypt, &blob, &params)),
        ErrorCode::IncompatiblePurpose
    );
}

#[test]
fn test_legacy_hardware_blob_without_subordinate() {
    let keystore =
        Keystore::new(sks_crypto_boring::implementation(), Box::new(BoringRng), Box::new(SystemClock))
            .with_master_key(legacy_master_key());
    let blob = legacy_blob(b'Q');
    assert_eq!(err_code(keystore.get_key_characteristics(&blob)), ErrorCode::InvalidKeyBlob);
}

#[test]
fn test_parallel_operations() {
    use std::sync::Arc;

    let keystore = Arc::new(keystore());
    let result = keystore
        .generate_key(
            &AuthorizationSetBuilder::new()
                .aes_encryption_key(256)
                .block_mode(BlockMode::Ctr)
                .padding(PaddingMode::None)
                .caller_nonce()
                .build(),
        )
        .unwrap();
    let params = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ctr)
        .padding(PaddingMode::None)
        .authorization(KeyParam::Nonce(vec![0x3c; 16]))
        .build();

    // The same operation run on many threads must be deterministic: fixed
    // nonce CTR, identical chunked inputs.
    let mut expected = None;
    let mut workers = Vec::new();
    for _i in 0..8 {
        let keystore = Arc::clone(&keystore);
        let key_blob = result.key_blob.clone();
        let params = params.to_vec();
        workers.push(std::thread::spawn(move || {
            let begin = keystore.begin(KeyPurpose::Encrypt, &key_blob, &params).unwrap();
            let mut ciphertext = Vec::new();
            for chunk in [&b"01234567"[..], &b"89abcdef"[..], &b"01234567"[..]] {
                ciphertext
                    .extend_from_slice(&keystore.update(begin.op_handle, chunk, &[]).unwrap().output);
            }
            ciphertext
                .extend_from_slice(&keystore.finish(begin.op_handle, &[], None, &[]).unwrap().output);
            ciphertext
        }));
    }
    for worker in workers {
        let ciphertext = worker.join().unwrap();
        assert_eq!(ciphertext.len(), 24);
        match &expected {
            None => expected = Some(ciphertext),
            Some(want) => assert_eq!(&ciphertext, want),
        }
    }
}

#[test]
fn test_hmac_verify_compare_is_against_caller_bytes() {
    // The engine compares the computed MAC against caller bytes with the
    // backend's constant-time comparator; sanity-check that comparator here.
    use sks_common::crypto::ConstTimeEq;
    let eq = BoringEq;
    assert!(eq.eq(b"abc", b"abc"));
    assert!(eq.ne(b"abc", b"abd"));
    assert!(eq.ne(b"abc", b"abcd"));
}
