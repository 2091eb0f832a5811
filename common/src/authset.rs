//! Ordered multiset of tagged authorization values, with a stable
//! serialization format.

use crate::{ks_err, Error};
use alloc::vec::Vec;
use sks_wire::{
    Algorithm, BlockMode, DateTime, Digest, EcCurve, KeyOrigin, KeyParam, KeyPurpose, KeySizeInBits,
    PaddingMode, RsaExponent, Tag, TagType,
};

#[cfg(test)]
mod tests;

/// Retrieve a `u8` from the start of the given slice, if possible.
pub(crate) fn consume_u8(data: &mut &[u8]) -> Result<u8, Error> {
    match data.first() {
        Some(b) => {
            *data = &(*data)[1..];
            Ok(*b)
        }
        None => Err(ks_err!(InvalidInputLength, "failed to find 1 byte")),
    }
}

/// Move past a bool value from the start of the given slice, if possible.
/// Bool values are only ever serialized as a single `0x01` byte.
pub(crate) fn consume_bool(data: &mut &[u8]) -> Result<(), Error> {
    let b = consume_u8(data)?;
    if b == 0x01 {
        Ok(())
    } else {
        Err(ks_err!(InvalidArgument, "bool value other than 1 encountered"))
    }
}

/// Retrieve a little-endian `u32` from the start of the given slice, if possible.
pub(crate) fn consume_u32(data: &mut &[u8]) -> Result<u32, Error> {
    if data.len() < 4 {
        return Err(ks_err!(InvalidInputLength, "failed to find 4 bytes"));
    }
    let chunk: [u8; 4] = data[..4].try_into().unwrap(); // safe: just checked
    *data = &(*data)[4..];
    Ok(u32::from_le_bytes(chunk))
}

/// Retrieve a little-endian `u64` from the start of the given slice, if possible.
pub(crate) fn consume_u64(data: &mut &[u8]) -> Result<u64, Error> {
    if data.len() < 8 {
        return Err(ks_err!(InvalidInputLength, "failed to find 8 bytes"));
    }
    let chunk: [u8; 8] = data[..8].try_into().unwrap(); // safe: just checked
    *data = &(*data)[8..];
    Ok(u64::from_le_bytes(chunk))
}

/// Retrieve a little-endian `i64` from the start of the given slice, if possible.
pub(crate) fn consume_i64(data: &mut &[u8]) -> Result<i64, Error> {
    if data.len() < 8 {
        return Err(ks_err!(InvalidInputLength, "failed to find 8 bytes"));
    }
    let chunk: [u8; 8] = data[..8].try_into().unwrap(); // safe: just checked
    *data = &(*data)[8..];
    Ok(i64::from_le_bytes(chunk))
}

/// Retrieve a vector of bytes from the start of the given slice, with the
/// length of the data given by a little-endian `u32` prefix.
pub(crate) fn consume_vec(data: &mut &[u8]) -> Result<Vec<u8>, Error> {
    let len = consume_u32(data)? as usize;
    if len > data.len() {
        return Err(ks_err!(InvalidInputLength, "failed to find {} bytes", len));
    }
    let result = data[..len].to_vec();
    *data = &(*data)[len..];
    Ok(result)
}

/// An ordered multiset of tagged authorization values.
///
/// Iteration order is insertion order.  Repeatable tags may occur more than
/// once; duplicates of non-repeatable tags are tolerated here and policed by
/// the tag policy layer.  Equality is multiset equality over typed values,
/// independent of entry order.
#[derive(Clone, Debug, Default, Eq)]
pub struct AuthorizationSet(pub Vec<KeyParam>);

impl PartialEq for AuthorizationSet {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let count = |set: &[KeyParam], param: &KeyParam| {
            set.iter().filter(|p| *p == param).count()
        };
        self.0.iter().all(|param| count(&self.0, param) == count(&other.0, param))
    }
}

impl From<Vec<KeyParam>> for AuthorizationSet {
    fn from(params: Vec<KeyParam>) -> Self {
        AuthorizationSet(params)
    }
}

impl core::ops::Deref for AuthorizationSet {
    type Target = [KeyParam];
    fn deref(&self) -> &[KeyParam] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a AuthorizationSet {
    type Item = &'a KeyParam;
    type IntoIter = core::slice::Iter<'a, KeyParam>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl AuthorizationSet {
    /// Create an empty set.
    pub fn new() -> Self {
        AuthorizationSet(Vec::new())
    }

    /// Append an entry.  May be called repeatedly for repeatable tags.
    pub fn push(&mut self, param: KeyParam) {
        self.0.push(param);
    }

    /// Indicate whether any entry carries the given tag.
    pub fn contains_tag(&self, tag: Tag) -> bool {
        self.0.iter().any(|param| param.tag() == tag)
    }

    /// Indicate whether the exact (tag, value) entry is present.
    pub fn contains(&self, param: &KeyParam) -> bool {
        self.0.iter().any(|p| p == param)
    }

    /// Return the first entry carrying the given tag, failing when absent.
    pub fn get(&self, tag: Tag) -> Result<&KeyParam, Error> {
        self.0
            .iter()
            .find(|param| param.tag() == tag)
            .ok_or_else(|| ks_err!(InvalidTag, "tag {:?} not found", tag))
    }

    /// Append all of `other`'s entries.
    pub fn union_with(&mut self, other: &AuthorizationSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Size in bytes of the serialized form, computed without serializing.
    pub fn serialized_size(&self) -> usize {
        let mut size = 4 + 4; // entry count + blob-bytes length
        for param in &self.0 {
            size += 4; // tag number
            size += match param.tag().tag_type() {
                TagType::Enum | TagType::EnumRep | TagType::Uint | TagType::UintRep => 4,
                TagType::Ulong | TagType::Date => 8,
                TagType::Bool => 1,
                TagType::Bignum | TagType::Bytes => {
                    8 + match param {
                        KeyParam::AssociatedData(v)
                        | KeyParam::Nonce(v)
                        | KeyParam::AeadTag(v) => v.len(),
                        _ => 0,
                    }
                }
                TagType::Invalid => 0,
            };
        }
        size
    }

    /// Serialize to the stable format:
    ///
    /// ```text
    /// [0..4]        Count N of entries, little-endian.
    /// [4..]         N serialized entries.
    /// [..+4]        Size B of the blob-bytes region, little-endian.
    /// [..+B]        Blob-bytes: concatenated byte payloads, in entry order.
    /// ```
    ///
    /// Individual entries are serialized as a little-endian `u32` tag number
    /// followed by a payload that depends on the tag's [`TagType`]:
    ///
    /// ```text
    /// [0..4]            u32 values (`Enum[Rep]`, `Uint[Rep]`)
    /// [0..8]            u64/i64 values (`Ulong`, `Date`)
    /// [0..1]            0x01 (`Bool`; present-only tags)
    /// [0..4] + [4..8]   Size + offset of data in blob-bytes (`Bytes`, `Bignum`)
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let mut entries = Vec::new();
        let mut blob = Vec::new();
        for param in &self.0 {
            entries.extend_from_slice(&(param.tag() as u32).to_le_bytes());
            match param {
                // Enum-holding variants.
                KeyParam::Purpose(v) => entries.extend_from_slice(&(*v as u32).to_le_bytes()),
                KeyParam::Algorithm(v) => entries.extend_from_slice(&(*v as u32).to_le_bytes()),
                KeyParam::BlockMode(v) => entries.extend_from_slice(&(*v as u32).to_le_bytes()),
                KeyParam::Digest(v) => entries.extend_from_slice(&(*v as u32).to_le_bytes()),
                KeyParam::Padding(v) => entries.extend_from_slice(&(*v as u32).to_le_bytes()),
                KeyParam::EcCurve(v) => entries.extend_from_slice(&(*v as u32).to_le_bytes()),
                KeyParam::Origin(v) => entries.extend_from_slice(&(*v as u32).to_le_bytes()),

                // `u32`-holding variants.
                KeyParam::KeySize(v) => entries.extend_from_slice(&v.0.to_le_bytes()),
                KeyParam::MacLength(v) => entries.extend_from_slice(&v.to_le_bytes()),

                // `u64`/`i64`-holding variants.
                KeyParam::RsaPublicExponent(v) => entries.extend_from_slice(&v.0.to_le_bytes()),
                KeyParam::CreationDatetime(v) => {
                    entries.extend_from_slice(&v.ms_since_epoch.to_le_bytes())
                }

                // `true`-holding variants.
                KeyParam::CallerNonce | KeyParam::NoAuthRequired => entries.push(0x01),

                // `Vec<u8>`-holding variants.
                KeyParam::AssociatedData(v) | KeyParam::Nonce(v) | KeyParam::AeadTag(v) => {
                    entries.extend_from_slice(&(v.len() as u32).to_le_bytes());
                    entries.extend_from_slice(&(blob.len() as u32).to_le_bytes());
                    blob.extend_from_slice(v);
                }
            }
        }

        let mut result = Vec::with_capacity(4 + entries.len() + 4 + blob.len());
        result.extend_from_slice(&(self.0.len() as u32).to_le_bytes());
        result.extend_from_slice(&entries);
        result.extend_from_slice(&(blob.len() as u32).to_le_bytes());
        result.extend_from_slice(&blob);
        result
    }

    /// Deserialize an authorization set, consuming the relevant prefix of
    /// `data`.  Fails with `InvalidInputLength` on truncation and
    /// `InvalidTag` on an unknown tag or type code.
    pub fn deserialize(data: &mut &[u8]) -> Result<Self, Error> {
        // Entries reference the blob-bytes region that follows them, so
        // collect descriptors first and resolve the byte payloads afterwards.
        enum Pending {
            Done(KeyParam),
            Blob { tag: Tag, len: usize, offset: usize },
        }

        let count = consume_u32(data)? as usize;
        let enum_err = |tag: Tag| move |_e| ks_err!(InvalidTag, "unknown enum value for {:?}", tag);
        let mut pending = Vec::with_capacity(count);
        for _i in 0..count {
            let raw_tag = consume_u32(data)?;
            let tag = Tag::n(raw_tag)
                .ok_or_else(|| ks_err!(InvalidTag, "unknown tag {} encountered", raw_tag))?;
            pending.push(match tag {
                // Enum-holding variants.
                Tag::Purpose => Pending::Done(KeyParam::Purpose(
                    KeyPurpose::try_from(consume_u32(data)? as i32).map_err(enum_err(tag))?,
                )),
                Tag::Algorithm => Pending::Done(KeyParam::Algorithm(
                    Algorithm::try_from(consume_u32(data)? as i32).map_err(enum_err(tag))?,
                )),
                Tag::BlockMode => Pending::Done(KeyParam::BlockMode(
                    BlockMode::try_from(consume_u32(data)? as i32).map_err(enum_err(tag))?,
                )),
                Tag::Digest => Pending::Done(KeyParam::Digest(
                    Digest::try_from(consume_u32(data)? as i32).map_err(enum_err(tag))?,
                )),
                Tag::Padding => Pending::Done(KeyParam::Padding(
                    PaddingMode::try_from(consume_u32(data)? as i32).map_err(enum_err(tag))?,
                )),
                Tag::EcCurve => Pending::Done(KeyParam::EcCurve(
                    EcCurve::try_from(consume_u32(data)? as i32).map_err(enum_err(tag))?,
                )),
                Tag::Origin => Pending::Done(KeyParam::Origin(
                    KeyOrigin::try_from(consume_u32(data)? as i32).map_err(enum_err(tag))?,
                )),

                // `u32`-holding variants.
                Tag::KeySize => {
                    Pending::Done(KeyParam::KeySize(KeySizeInBits(consume_u32(data)?)))
                }
                Tag::MacLength => Pending::Done(KeyParam::MacLength(consume_u32(data)?)),

                // `u64`/`i64`-holding variants.
                Tag::RsaPublicExponent => {
                    Pending::Done(KeyParam::RsaPublicExponent(RsaExponent(consume_u64(data)?)))
                }
                Tag::CreationDatetime => Pending::Done(KeyParam::CreationDatetime(DateTime {
                    ms_since_epoch: consume_i64(data)?,
                })),

                // `true`-holding variants.
                Tag::CallerNonce => {
                    consume_bool(data)?;
                    Pending::Done(KeyParam::CallerNonce)
                }
                Tag::NoAuthRequired => {
                    consume_bool(data)?;
                    Pending::Done(KeyParam::NoAuthRequired)
                }

                // `Vec<u8>`-holding variants.
                Tag::AssociatedData | Tag::Nonce | Tag::AeadTag => {
                    let len = consume_u32(data)? as usize;
                    let offset = consume_u32(data)? as usize;
                    Pending::Blob { tag, len, offset }
                }

                Tag::Invalid => {
                    return Err(ks_err!(InvalidTag, "invalid tag {:?} encountered", tag));
                }
            });
        }

        let blob_size = consume_u32(data)? as usize;
        if blob_size > data.len() {
            return Err(ks_err!(InvalidInputLength, "failed to find {} blob bytes", blob_size));
        }
        let blob_data = &data[..blob_size];
        *data = &data[blob_size..];

        // Resolve the byte payloads, expecting each blob to start at the next
        // unconsumed offset in the blob-bytes region.
        let mut next_offset = 0;
        let mut results = Vec::with_capacity(count);
        for entry in pending {
            results.push(match entry {
                Pending::Done(param) => param,
                Pending::Blob { tag, len, offset } => {
                    if offset != next_offset {
                        return Err(ks_err!(
                            InvalidInputLength,
                            "got blob offset {} instead of {}",
                            offset,
                            next_offset
                        ));
                    }
                    if offset + len > blob_data.len() {
                        return Err(ks_err!(
                            InvalidInputLength,
                            "blob at [{}..{}+{}] goes beyond blob data size {}",
                            offset,
                            offset,
                            len,
                            blob_data.len(),
                        ));
                    }
                    let bytes = blob_data[offset..offset + len].to_vec();
                    next_offset += len;
                    match tag {
                        Tag::AssociatedData => KeyParam::AssociatedData(bytes),
                        Tag::Nonce => KeyParam::Nonce(bytes),
                        Tag::AeadTag => KeyParam::AeadTag(bytes),
                        _ => unreachable!(), // only byte-holding tags are Pending::Blob
                    }
                }
            });
        }
        Ok(AuthorizationSet(results))
    }
}

/// Fluent builder for authorization sets describing common key kinds.  This
/// is a caller convenience; the engine only ever sees the finished set.
#[derive(Default)]
pub struct AuthorizationSetBuilder(AuthorizationSet);

impl AuthorizationSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary entry.
    pub fn authorization(mut self, param: KeyParam) -> Self {
        self.0.push(param);
        self
    }

    fn algorithm(self, algorithm: Algorithm) -> Self {
        self.authorization(KeyParam::Algorithm(algorithm))
    }

    fn key_size(self, bits: u32) -> Self {
        self.authorization(KeyParam::KeySize(KeySizeInBits(bits)))
    }

    fn signing_purposes(self) -> Self {
        self.authorization(KeyParam::Purpose(KeyPurpose::Sign))
            .authorization(KeyParam::Purpose(KeyPurpose::Verify))
    }

    fn encryption_purposes(self) -> Self {
        self.authorization(KeyParam::Purpose(KeyPurpose::Encrypt))
            .authorization(KeyParam::Purpose(KeyPurpose::Decrypt))
    }

    /// RSA key permitted to sign and verify.
    pub fn rsa_signing_key(self, key_size: u32, public_exponent: u64) -> Self {
        self.algorithm(Algorithm::Rsa)
            .key_size(key_size)
            .authorization(KeyParam::RsaPublicExponent(RsaExponent(public_exponent)))
            .signing_purposes()
    }

    /// RSA key permitted to encrypt and decrypt.
    pub fn rsa_encryption_key(self, key_size: u32, public_exponent: u64) -> Self {
        self.algorithm(Algorithm::Rsa)
            .key_size(key_size)
            .authorization(KeyParam::RsaPublicExponent(RsaExponent(public_exponent)))
            .encryption_purposes()
    }

    /// ECDSA key permitted to sign and verify.
    pub fn ecdsa_signing_key(self, curve: EcCurve) -> Self {
        self.algorithm(Algorithm::Ec)
            .authorization(KeyParam::EcCurve(curve))
            .signing_purposes()
    }

    /// AES key permitted to encrypt and decrypt.
    pub fn aes_encryption_key(self, key_size: u32) -> Self {
        self.algorithm(Algorithm::Aes).key_size(key_size).encryption_purposes()
    }

    /// HMAC key permitted to sign and verify.
    pub fn hmac_key(self, key_size: u32) -> Self {
        self.algorithm(Algorithm::Hmac).key_size(key_size).signing_purposes()
    }

    /// Add a permitted digest.
    pub fn digest(self, digest: Digest) -> Self {
        self.authorization(KeyParam::Digest(digest))
    }

    /// Add a permitted padding mode.
    pub fn padding(self, padding: PaddingMode) -> Self {
        self.authorization(KeyParam::Padding(padding))
    }

    /// Add a permitted block mode.
    pub fn block_mode(self, mode: BlockMode) -> Self {
        self.authorization(KeyParam::BlockMode(mode))
    }

    /// Permit caller-supplied nonces.
    pub fn caller_nonce(self) -> Self {
        self.authorization(KeyParam::CallerNonce)
    }

    pub fn no_auth_required(self) -> Self {
        self.authorization(KeyParam::NoAuthRequired)
    }

    pub fn build(self) -> AuthorizationSet {
        self.0
    }
}
