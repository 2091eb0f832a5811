use super::*;
use crate::authset::AuthorizationSetBuilder;
use crate::expect_err;
use alloc::vec;
use sks_wire::{BlockMode, PaddingMode};

#[test]
fn test_blob_format_dispatch() {
    assert_eq!(blob_format(&[0x00, 1, 2, 3]).unwrap(), BlobFormat::Native);
    assert_eq!(blob_format(&[b'P', 1, 2, 3]).unwrap(), BlobFormat::LegacySoftware);
    assert_eq!(blob_format(&[b'Q', 1, 2, 3]).unwrap(), BlobFormat::LegacyHardware);
    expect_err!(blob_format(&[b'R', 1, 2, 3]), "unknown key blob sentinel");
    expect_err!(blob_format(&[]), "empty key blob");
}

#[test]
fn test_legacy_blob_round_trip() {
    let hw_enforced = AuthorizationSetBuilder::new().rsa_signing_key(512, 3).build();
    let sw_enforced = AuthorizationSetBuilder::new()
        .block_mode(BlockMode::Ecb)
        .padding(PaddingMode::None)
        .build();
    let blob = legacy::EncryptedKeyBlob {
        sentinel: legacy::SOFTWARE_SENTINEL,
        nonce: [0x42; legacy::NONCE_SIZE],
        ciphertext: vec![0xaa; 48],
        tag: [0x17; legacy::TAG_SIZE],
        hw_enforced,
        sw_enforced,
    };
    let data = blob.serialize();
    let recovered = legacy::EncryptedKeyBlob::deserialize(&data).unwrap();
    assert_eq!(recovered, blob);
}

#[test]
fn test_legacy_blob_truncated() {
    let blob = legacy::EncryptedKeyBlob {
        sentinel: legacy::HARDWARE_SENTINEL,
        nonce: [0u8; legacy::NONCE_SIZE],
        ciphertext: vec![1, 2, 3, 4],
        tag: [0u8; legacy::TAG_SIZE],
        hw_enforced: AuthorizationSetBuilder::new().build(),
        sw_enforced: AuthorizationSetBuilder::new().build(),
    };
    let data = blob.serialize();
    for len in 1..data.len() {
        let result = legacy::EncryptedKeyBlob::deserialize(&data[..len]);
        expect_err!(result, "InvalidKeyBlob");
    }
}

#[test]
fn test_legacy_blob_bad_sentinel() {
    let mut data = legacy::EncryptedKeyBlob {
        sentinel: legacy::SOFTWARE_SENTINEL,
        nonce: [0u8; legacy::NONCE_SIZE],
        ciphertext: vec![1, 2, 3, 4],
        tag: [0u8; legacy::TAG_SIZE],
        hw_enforced: AuthorizationSetBuilder::new().build(),
        sw_enforced: AuthorizationSetBuilder::new().build(),
    }
    .serialize();
    data[0] = b'X';
    expect_err!(legacy::EncryptedKeyBlob::deserialize(&data), "unexpected legacy sentinel");
}
