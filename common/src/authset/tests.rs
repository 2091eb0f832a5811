use super::*;
use crate::expect_err;
use alloc::vec;

fn sample_set() -> AuthorizationSet {
    AuthorizationSetBuilder::new()
        .aes_encryption_key(128)
        .block_mode(BlockMode::Gcm)
        .padding(PaddingMode::None)
        .caller_nonce()
        .authorization(KeyParam::Nonce(vec![1, 2, 3, 4]))
        .authorization(KeyParam::AssociatedData(vec![0xaa; 7]))
        .build()
}

#[test]
fn test_serialize_round_trip() {
    let set = sample_set();
    let data = set.serialize();
    assert_eq!(data.len(), set.serialized_size());

    let mut slice = &data[..];
    let recovered = AuthorizationSet::deserialize(&mut slice).unwrap();
    assert!(slice.is_empty());
    // Entry order and byte content must be preserved exactly.
    assert_eq!(recovered.0, set.0);
    assert_eq!(recovered.serialize(), data);
}

#[test]
fn test_deserialize_truncated() {
    let data = sample_set().serialize();
    for len in 0..data.len() {
        let mut slice = &data[..len];
        let result = AuthorizationSet::deserialize(&mut slice);
        expect_err!(result, "failed to find");
    }
}

#[test]
fn test_deserialize_unknown_tag() {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_le_bytes()); // one entry
    data.extend_from_slice(&0x3000_9999u32.to_le_bytes()); // Uint-typed, unknown number
    data.extend_from_slice(&42u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // no blob bytes
    let result = AuthorizationSet::deserialize(&mut &data[..]);
    expect_err!(result, "unknown tag");
}

#[test]
fn test_deserialize_bad_blob_offset() {
    let mut set = AuthorizationSet::new();
    set.push(KeyParam::Nonce(vec![1, 2, 3]));
    let mut data = set.serialize();
    // Corrupt the offset field of the Nonce entry (tag + len already read).
    let offset_pos = 4 + 4 + 4;
    data[offset_pos] = 7;
    let result = AuthorizationSet::deserialize(&mut &data[..]);
    expect_err!(result, "blob offset");
}

#[test]
fn test_contains_and_get() {
    let set = sample_set();
    assert!(set.contains_tag(Tag::Algorithm));
    assert!(set.contains(&KeyParam::BlockMode(BlockMode::Gcm)));
    assert!(!set.contains(&KeyParam::BlockMode(BlockMode::Ecb)));
    assert!(!set.contains_tag(Tag::Digest));
    assert_eq!(set.get(Tag::KeySize).unwrap(), &KeyParam::KeySize(KeySizeInBits(128)));
    expect_err!(set.get(Tag::Digest), "not found");
}

#[test]
fn test_multiset_equality() {
    let mut left = AuthorizationSet::new();
    left.push(KeyParam::Digest(Digest::Sha256));
    left.push(KeyParam::Digest(Digest::Sha1));
    let mut right = AuthorizationSet::new();
    right.push(KeyParam::Digest(Digest::Sha1));
    right.push(KeyParam::Digest(Digest::Sha256));
    assert_eq!(left, right);

    right.push(KeyParam::Digest(Digest::Sha1));
    assert_ne!(left, right);
}

#[test]
fn test_union_preserves_order() {
    let mut left = AuthorizationSet::new();
    left.push(KeyParam::Digest(Digest::Sha256));
    let mut right = AuthorizationSet::new();
    right.push(KeyParam::Digest(Digest::Sha1));
    right.push(KeyParam::CallerNonce);
    left.union_with(&right);
    assert_eq!(
        left.0,
        vec![
            KeyParam::Digest(Digest::Sha256),
            KeyParam::Digest(Digest::Sha1),
            KeyParam::CallerNonce
        ]
    );
}

#[test]
fn test_empty_set_round_trip() {
    let set = AuthorizationSet::new();
    let data = set.serialize();
    assert_eq!(data, vec![0, 0, 0, 0, 0, 0, 0, 0]);
    let recovered = AuthorizationSet::deserialize(&mut &data[..]).unwrap();
    assert!(recovered.is_empty());
}
