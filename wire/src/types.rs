//! Core enums and the tag/value model for the keystore engine.
//!
//! - Enums are exhaustive Rust enums backed by `i32`, using Rust naming
//!   conventions (CamelCase values) with the numbering of the original
//!   keystore HAL.
//! - `Tag` values are 32-bit with the value type packed into the top four
//!   bits; `KeyParam` is an exhaustive Rust `enum` with one typed variant per
//!   tag, used in place of a loosely-typed (tag, union) pair.

use crate::{try_from_n, KeySizeInBits, RsaExponent};
use alloc::vec::Vec;
use enumn::N;

/// Algorithms supported by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(i32)]
pub enum Algorithm {
    Rsa = 1,
    Ec = 3,
    Aes = 32,
    Hmac = 128,
}
try_from_n!(Algorithm);

/// Block cipher modes of operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(i32)]
pub enum BlockMode {
    Ecb = 1,
    Cbc = 2,
    Ctr = 3,
    Gcm = 32,
}
try_from_n!(BlockMode);

/// Digest functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(i32)]
pub enum Digest {
    None = 0,
    Md5 = 1,
    Sha1 = 2,
    Sha224 = 3,
    Sha256 = 4,
    Sha384 = 5,
    Sha512 = 6,
}
try_from_n!(Digest);

/// Padding modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(i32)]
pub enum PaddingMode {
    None = 1,
    RsaOaep = 2,
    RsaPss = 3,
    RsaPkcs115Encrypt = 4,
    RsaPkcs115Sign = 5,
    Pkcs7 = 64,
}
try_from_n!(PaddingMode);

/// Purposes for which a key may be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(i32)]
pub enum KeyPurpose {
    Encrypt = 0,
    Decrypt = 1,
    Sign = 2,
    Verify = 3,
}
try_from_n!(KeyPurpose);

/// Elliptic curves supported for ECDSA keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(i32)]
pub enum EcCurve {
    P224 = 0,
    P256 = 1,
    P384 = 2,
    P521 = 3,
}
try_from_n!(EcCurve);

/// Provenance of key material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(i32)]
pub enum KeyOrigin {
    Generated = 0,
    Imported = 2,
}
try_from_n!(KeyOrigin);

/// Formats for key import and export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(i32)]
pub enum KeyFormat {
    X509 = 0,
    Pkcs8 = 1,
    Raw = 3,
}
try_from_n!(KeyFormat);

/// Error codes returned across the command surface.  `Ok` means success.
#[derive(Clone, Copy, Debug, PartialEq, Eq, N)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    UnsupportedPurpose = -2,
    IncompatiblePurpose = -3,
    UnsupportedAlgorithm = -4,
    UnsupportedKeySize = -6,
    UnsupportedBlockMode = -7,
    UnsupportedMacLength = -9,
    UnsupportedPaddingMode = -10,
    IncompatiblePaddingMode = -11,
    UnsupportedDigest = -12,
    IncompatibleDigest = -13,
    UnsupportedKeyFormat = -17,
    InvalidInputLength = -21,
    OutputParameterNull = -27,
    InvalidOperationHandle = -28,
    VerificationFailed = -30,
    TooManyOperations = -31,
    InvalidKeyBlob = -33,
    InvalidArgument = -38,
    InvalidTag = -40,
    ImportParameterMismatch = -44,
    InvalidNonce = -52,
    CallerNonceProhibited = -55,
    UnknownError = -1000,
}
try_from_n!(ErrorCode);

/// Representation of a date/time, in milliseconds since the epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime {
    pub ms_since_epoch: i64,
}

/// The value type of a tag, held in the top four bits of the tag number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum TagType {
    Invalid = 0,
    Enum = 0x1000_0000,
    EnumRep = 0x2000_0000,
    Uint = 0x3000_0000,
    UintRep = 0x4000_0000,
    Ulong = 0x5000_0000,
    Date = 0x6000_0000,
    Bool = 0x7000_0000,
    Bignum = 0x8000_0000,
    Bytes = 0x9000_0000,
}

/// Mask covering the [`TagType`] bits of a tag number.
pub const TAG_TYPE_MASK: u32 = 0xf000_0000;

/// Tags that may appear in an authorization set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(u32)]
pub enum Tag {
    Invalid = 0,
    Purpose = TagType::EnumRep as u32 | 1,
    Algorithm = TagType::Enum as u32 | 2,
    KeySize = TagType::Uint as u32 | 3,
    BlockMode = TagType::EnumRep as u32 | 4,
    Digest = TagType::EnumRep as u32 | 5,
    Padding = TagType::EnumRep as u32 | 6,
    CallerNonce = TagType::Bool as u32 | 7,
    EcCurve = TagType::Enum as u32 | 10,
    RsaPublicExponent = TagType::Ulong as u32 | 200,
    NoAuthRequired = TagType::Bool as u32 | 503,
    CreationDatetime = TagType::Date as u32 | 701,
    Origin = TagType::Enum as u32 | 702,
    AssociatedData = TagType::Bytes as u32 | 1000,
    Nonce = TagType::Bytes as u32 | 1001,
    AeadTag = TagType::Bytes as u32 | 1002,
    MacLength = TagType::Uint as u32 | 1003,
}

impl Tag {
    /// Return the value type encoded in the tag number.
    pub fn tag_type(self) -> TagType {
        TagType::n(self as u32 & TAG_TYPE_MASK).unwrap_or(TagType::Invalid)
    }
}

/// Return the [`TagType`] for a raw 32-bit tag number, without requiring the
/// tag itself to be known.
pub fn tag_type_of(raw: u32) -> TagType {
    TagType::n(raw & TAG_TYPE_MASK).unwrap_or(TagType::Invalid)
}

/// Exhaustive enum of all tagged values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyParam {
    Purpose(KeyPurpose),
    Algorithm(Algorithm),
    KeySize(KeySizeInBits),
    BlockMode(BlockMode),
    Digest(Digest),
    Padding(PaddingMode),
    CallerNonce,
    EcCurve(EcCurve),
    RsaPublicExponent(RsaExponent),
    NoAuthRequired,
    CreationDatetime(DateTime),
    Origin(KeyOrigin),
    AssociatedData(Vec<u8>),
    Nonce(Vec<u8>),
    AeadTag(Vec<u8>),
    MacLength(u32),
}

impl KeyParam {
    /// Return the [`Tag`] for the parameter.
    pub fn tag(&self) -> Tag {
        match self {
            KeyParam::Purpose(_) => Tag::Purpose,
            KeyParam::Algorithm(_) => Tag::Algorithm,
            KeyParam::KeySize(_) => Tag::KeySize,
            KeyParam::BlockMode(_) => Tag::BlockMode,
            KeyParam::Digest(_) => Tag::Digest,
            KeyParam::Padding(_) => Tag::Padding,
            KeyParam::CallerNonce => Tag::CallerNonce,
            KeyParam::EcCurve(_) => Tag::EcCurve,
            KeyParam::RsaPublicExponent(_) => Tag::RsaPublicExponent,
            KeyParam::NoAuthRequired => Tag::NoAuthRequired,
            KeyParam::CreationDatetime(_) => Tag::CreationDatetime,
            KeyParam::Origin(_) => Tag::Origin,
            KeyParam::AssociatedData(_) => Tag::AssociatedData,
            KeyParam::Nonce(_) => Tag::Nonce,
            KeyParam::AeadTag(_) => Tag::AeadTag,
            KeyParam::MacLength(_) => Tag::MacLength,
        }
    }
}
