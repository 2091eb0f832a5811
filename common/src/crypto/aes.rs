//! Functionality related to AES encryption.

use super::{nonce, Rng};
use crate::{get_opt_tag_value, get_tag_value, ks_err, tag, Error};
use alloc::vec::Vec;
use sks_wire::{BlockMode, ErrorCode, KeyParam, KeySizeInBits, PaddingMode};
use zeroize::ZeroizeOnDrop;

/// Size of an AES block in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Size of an AES-GCM nonce in bytes.
pub const GCM_NONCE_SIZE: usize = 12; // 96 bits

/// Size of an AES-OCB nonce in bytes (legacy blobs only).
pub const OCB_NONCE_SIZE: usize = 12;

/// AES variant.
#[derive(Clone, Copy, Debug)]
pub enum Variant {
    Aes128,
    Aes192,
    Aes256,
}

/// An AES-128, AES-192 or AES-256 key.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub enum Key {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl Key {
    /// Create a new [`Key`] from raw data, which must be 16, 24 or 32 bytes long.
    pub fn new(data: Vec<u8>) -> Result<Self, Error> {
        match data.len() {
            16 => Ok(Key::Aes128(data.try_into().unwrap())), // safe: len checked
            24 => Ok(Key::Aes192(data.try_into().unwrap())), // safe: len checked
            32 => Ok(Key::Aes256(data.try_into().unwrap())), // safe: len checked
            l => Err(ks_err!(UnsupportedKeySize, "AES keys must be 16, 24 or 32 bytes not {}", l)),
        }
    }

    /// Create a new [`Key`] from raw data, which must be 16, 24 or 32 bytes long.
    pub fn new_from(data: &[u8]) -> Result<Self, Error> {
        Key::new(data.to_vec())
    }

    /// Indicate the size of the key in bits.
    pub fn size(&self) -> KeySizeInBits {
        KeySizeInBits(match self {
            Key::Aes128(_) => 128,
            Key::Aes192(_) => 192,
            Key::Aes256(_) => 256,
        })
    }

    /// Return the key bytes.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Key::Aes128(k) => &k[..],
            Key::Aes192(k) => &k[..],
            Key::Aes256(k) => &k[..],
        }
    }
}

/// Mode of AES plain cipher operation.  Associated value is the nonce.
#[derive(Clone, Copy, Debug)]
pub enum CipherMode {
    EcbNoPadding,
    EcbPkcs7Padding,
    CbcNoPadding { nonce: [u8; BLOCK_SIZE] },
    CbcPkcs7Padding { nonce: [u8; BLOCK_SIZE] },
    Ctr { nonce: [u8; BLOCK_SIZE] },
}

/// Mode of AES-GCM operation.  Associated value is the nonce.
#[derive(Clone, Copy, Debug)]
pub enum GcmMode {
    GcmTag12 { nonce: [u8; GCM_NONCE_SIZE] },
    GcmTag13 { nonce: [u8; GCM_NONCE_SIZE] },
    GcmTag14 { nonce: [u8; GCM_NONCE_SIZE] },
    GcmTag15 { nonce: [u8; GCM_NONCE_SIZE] },
    GcmTag16 { nonce: [u8; GCM_NONCE_SIZE] },
}

impl GcmMode {
    /// Return the tag length (in bytes) for an AES-GCM mode.
    pub fn tag_len(&self) -> usize {
        match self {
            GcmMode::GcmTag12 { .. } => 12,
            GcmMode::GcmTag13 { .. } => 13,
            GcmMode::GcmTag14 { .. } => 14,
            GcmMode::GcmTag15 { .. } => 15,
            GcmMode::GcmTag16 { .. } => 16,
        }
    }

    /// Return the nonce for an AES-GCM mode.
    pub fn nonce(&self) -> &[u8; GCM_NONCE_SIZE] {
        match self {
            GcmMode::GcmTag12 { nonce } => nonce,
            GcmMode::GcmTag13 { nonce } => nonce,
            GcmMode::GcmTag14 { nonce } => nonce,
            GcmMode::GcmTag15 { nonce } => nonce,
            GcmMode::GcmTag16 { nonce } => nonce,
        }
    }
}

/// Mode of AES AEAD operation.  OCB is only ever used for decrypting legacy
/// key blobs.
#[derive(Clone, Copy, Debug)]
pub enum AeadMode {
    Gcm(GcmMode),
    Ocb { nonce: [u8; OCB_NONCE_SIZE] },
}

/// Mode of AES operation.
#[derive(Clone, Copy, Debug)]
pub enum Mode {
    Cipher(CipherMode),
    Aead(GcmMode),
}

impl Mode {
    /// Determine the [`Mode`], rejecting invalid parameters.  Use
    /// `caller_nonce` if provided, otherwise generate a fresh nonce using the
    /// provided [`Rng`] instance.
    pub fn new(
        params: &[KeyParam],
        caller_nonce: Option<&Vec<u8>>,
        rng: &mut dyn Rng,
    ) -> Result<Self, Error> {
        let mode = tag::get_block_mode(params)?;
        let padding = tag::get_padding_mode(params)?;
        match mode {
            BlockMode::Ecb => {
                if caller_nonce.is_some() {
                    return Err(ks_err!(InvalidNonce, "nonce unexpectedly provided for AES-ECB"));
                }
                match padding {
                    PaddingMode::None => Ok(Mode::Cipher(CipherMode::EcbNoPadding)),
                    PaddingMode::Pkcs7 => Ok(Mode::Cipher(CipherMode::EcbPkcs7Padding)),
                    _ => Err(ks_err!(
                        IncompatiblePaddingMode,
                        "expected NONE/PKCS7 padding for AES-ECB"
                    )),
                }
            }
            BlockMode::Cbc => {
                let nonce: [u8; BLOCK_SIZE] =
                    nonce(BLOCK_SIZE, caller_nonce, rng)?.try_into().map_err(|_e| {
                        ks_err!(InvalidNonce, "want {} byte nonce for AES-CBC", BLOCK_SIZE)
                    })?;
                match padding {
                    PaddingMode::None => Ok(Mode::Cipher(CipherMode::CbcNoPadding { nonce })),
                    PaddingMode::Pkcs7 => Ok(Mode::Cipher(CipherMode::CbcPkcs7Padding { nonce })),
                    _ => Err(ks_err!(
                        IncompatiblePaddingMode,
                        "expected NONE/PKCS7 padding for AES-CBC"
                    )),
                }
            }
            BlockMode::Ctr => {
                if padding != PaddingMode::None {
                    return Err(ks_err!(
                        IncompatiblePaddingMode,
                        "expected NONE padding for AES-CTR"
                    ));
                }
                let nonce: [u8; BLOCK_SIZE] =
                    nonce(BLOCK_SIZE, caller_nonce, rng)?.try_into().map_err(|_e| {
                        ks_err!(InvalidNonce, "want {} byte nonce for AES-CTR", BLOCK_SIZE)
                    })?;
                Ok(Mode::Cipher(CipherMode::Ctr { nonce }))
            }
            BlockMode::Gcm => {
                if padding != PaddingMode::None {
                    return Err(ks_err!(
                        IncompatiblePaddingMode,
                        "expected NONE padding for AES-GCM"
                    ));
                }
                let nonce: [u8; GCM_NONCE_SIZE] = nonce(GCM_NONCE_SIZE, caller_nonce, rng)?
                    .try_into()
                    .map_err(|_e| ks_err!(InvalidNonce, "want 12 byte nonce for AES-GCM"))?;
                let tag_len =
                    get_tag_value!(params, MacLength, ErrorCode::UnsupportedMacLength)?;
                if tag_len % 8 != 0 {
                    return Err(ks_err!(
                        UnsupportedMacLength,
                        "tag length {} not a multiple of 8",
                        tag_len
                    ));
                }
                match tag_len / 8 {
                    12 => Ok(Mode::Aead(GcmMode::GcmTag12 { nonce })),
                    13 => Ok(Mode::Aead(GcmMode::GcmTag13 { nonce })),
                    14 => Ok(Mode::Aead(GcmMode::GcmTag14 { nonce })),
                    15 => Ok(Mode::Aead(GcmMode::GcmTag15 { nonce })),
                    16 => Ok(Mode::Aead(GcmMode::GcmTag16 { nonce })),
                    v => Err(ks_err!(
                        UnsupportedMacLength,
                        "want 12-16 byte tag for AES-GCM not {} bytes",
                        v
                    )),
                }
            }
        }
    }

    /// Return the engine-chosen nonce, if the mode carries one and the caller
    /// did not supply it.
    pub fn nonce(&self) -> Option<&[u8]> {
        match self {
            Mode::Cipher(CipherMode::EcbNoPadding) | Mode::Cipher(CipherMode::EcbPkcs7Padding) => {
                None
            }
            Mode::Cipher(CipherMode::CbcNoPadding { nonce })
            | Mode::Cipher(CipherMode::CbcPkcs7Padding { nonce })
            | Mode::Cipher(CipherMode::Ctr { nonce }) => Some(&nonce[..]),
            Mode::Aead(gcm) => Some(&gcm.nonce()[..]),
        }
    }
}

/// Retrieve the caller-supplied nonce from operation parameters, if present.
pub fn caller_nonce(params: &[KeyParam]) -> Result<Option<&Vec<u8>>, Error> {
    get_opt_tag_value!(params, Nonce)
}
