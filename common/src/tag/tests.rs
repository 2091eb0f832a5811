use super::*;
use crate::authset::AuthorizationSetBuilder;
use crate::expect_err;

#[test]
fn test_digest_len() {
    assert_eq!(digest_len(Digest::Sha256).unwrap(), 256);
    assert_eq!(digest_len(Digest::Sha512).unwrap(), 512);
    expect_err!(digest_len(Digest::None), "invalid digest");
}

#[test]
fn test_rsa_gen_requires_exponent() {
    let params = AuthorizationSetBuilder::new()
        .authorization(KeyParam::Algorithm(Algorithm::Rsa))
        .authorization(KeyParam::KeySize(KeySizeInBits(2048)))
        .build();
    expect_err!(extract_key_gen_characteristics(&params), "RsaPublicExponent");
}

#[test]
fn test_rsa_gen_bad_key_size() {
    let params = AuthorizationSetBuilder::new().rsa_signing_key(1000, 65537).build();
    expect_err!(extract_key_gen_characteristics(&params), "unsupported KEY_SIZE");
}

#[test]
fn test_ec_gen_curve_from_key_size() {
    let params = AuthorizationSetBuilder::new()
        .authorization(KeyParam::Algorithm(Algorithm::Ec))
        .authorization(KeyParam::KeySize(KeySizeInBits(256)))
        .authorization(KeyParam::Purpose(KeyPurpose::Sign))
        .authorization(KeyParam::Digest(Digest::Sha256))
        .build();
    let (chars, keygen_info) = extract_key_gen_characteristics(&params).unwrap();
    assert!(matches!(keygen_info, KeyGenInfo::Ec(EcCurve::P256)));
    assert!(chars.contains(&KeyParam::EcCurve(EcCurve::P256)));
}

#[test]
fn test_ec_gen_bad_key_size() {
    let params = AuthorizationSetBuilder::new()
        .authorization(KeyParam::Algorithm(Algorithm::Ec))
        .authorization(KeyParam::KeySize(KeySizeInBits(192)))
        .authorization(KeyParam::Purpose(KeyPurpose::Sign))
        .build();
    expect_err!(extract_key_gen_characteristics(&params), "no NIST curve");
}

#[test]
fn test_hmac_gen_rejects_bad_digest() {
    for digest in [Digest::None, Digest::Md5] {
        let params =
            AuthorizationSetBuilder::new().hmac_key(128).digest(digest).build();
        expect_err!(extract_key_gen_characteristics(&params), "unsupported digest");
    }
}

#[test]
fn test_auto_added_tags_rejected() {
    let params = AuthorizationSetBuilder::new()
        .aes_encryption_key(128)
        .authorization(KeyParam::Origin(sks_wire::KeyOrigin::Generated))
        .build();
    expect_err!(extract_key_gen_characteristics(&params), "engine-added tag");
}

#[test]
fn test_begin_purpose_must_be_authorized() {
    let (chars, _) = extract_key_gen_characteristics(
        &AuthorizationSetBuilder::new()
            .rsa_signing_key(2048, 65537)
            .digest(Digest::Sha256)
            .padding(PaddingMode::RsaPss)
            .build(),
    )
    .unwrap();
    let begin_params = AuthorizationSetBuilder::new()
        .digest(Digest::Sha256)
        .padding(PaddingMode::RsaPss)
        .build();
    expect_err!(
        check_begin_params(&chars, KeyPurpose::Encrypt, &begin_params),
        "not in key characteristics"
    );
}

#[test]
fn test_begin_pss_key_too_small() {
    // Eight bytes larger than the digest, so below the ten-byte margin that
    // PSS salt requires.
    let (chars, _) = extract_key_gen_characteristics(
        &AuthorizationSetBuilder::new()
            .rsa_signing_key(256 + 8 * 8, 3)
            .digest(Digest::Sha256)
            .padding(PaddingMode::RsaPss)
            .build(),
    )
    .unwrap();
    let begin_params = AuthorizationSetBuilder::new()
        .digest(Digest::Sha256)
        .padding(PaddingMode::RsaPss)
        .build();
    expect_err!(
        check_begin_params(&chars, KeyPurpose::Sign, &begin_params),
        "too small for RSA-PSS"
    );
}

#[test]
fn test_hmac_mac_length_rules() {
    let chars = AuthorizationSetBuilder::new().hmac_key(128).digest(Digest::Sha256).build();
    // Begin-time value is authoritative.
    let params = AuthorizationSetBuilder::new()
        .authorization(KeyParam::MacLength(128))
        .build();
    assert_eq!(hmac_mac_length(&chars, &params, Digest::Sha256).unwrap(), 128);
    // Falls back to the digest width.
    assert_eq!(hmac_mac_length(&chars, &[], Digest::Sha256).unwrap(), 256);
    // Too long or misaligned values are rejected.
    let params = AuthorizationSetBuilder::new()
        .authorization(KeyParam::MacLength(264))
        .build();
    expect_err!(hmac_mac_length(&chars, &params, Digest::Sha256), "MAC length");
    let params = AuthorizationSetBuilder::new()
        .authorization(KeyParam::MacLength(100))
        .build();
    expect_err!(hmac_mac_length(&chars, &params, Digest::Sha256), "MAC length");
}
