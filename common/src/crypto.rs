//! Abstractions and related types for accessing cryptographic primitives
//! and related functionality.

use crate::{ks_err, Error};
use alloc::vec::Vec;
use sks_wire::{Algorithm, EcCurve};
use zeroize::ZeroizeOnDrop;

pub mod aes;
pub mod ec;
pub mod hmac;
pub mod rsa;

mod traits;
pub use traits::*;

/// Direction of a symmetric cipher operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymmetricOperation {
    Encrypt,
    Decrypt,
}

/// Raw key material as stored inside a sealed key blob.  For RSA and EC keys
/// this is a DER-encoded private key; for AES and HMAC keys it is the key
/// bytes themselves.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct RawKeyMaterial(pub Vec<u8>);

impl core::fmt::Debug for RawKeyMaterial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RawKeyMaterial({} bytes)", self.0.len())
    }
}

/// Typed key material, polymorphic over the supported algorithms.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Rsa(rsa::Key),
    Ec(EcCurve, ec::Key),
    Aes(aes::Key),
    Hmac(hmac::Key),
}

impl KeyMaterial {
    /// Return the algorithm of the key.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyMaterial::Rsa(_) => Algorithm::Rsa,
            KeyMaterial::Ec(_, _) => Algorithm::Ec,
            KeyMaterial::Aes(_) => Algorithm::Aes,
            KeyMaterial::Hmac(_) => Algorithm::Hmac,
        }
    }

    /// Return the raw form of the key material, as sealed into key blobs.
    pub fn to_raw(&self) -> RawKeyMaterial {
        RawKeyMaterial(match self {
            KeyMaterial::Rsa(key) => key.0.clone(),
            KeyMaterial::Ec(_, key) => key.der_bytes().to_vec(),
            KeyMaterial::Aes(key) => key.bytes().to_vec(),
            KeyMaterial::Hmac(key) => key.0.clone(),
        })
    }

    /// Return the ASN.1 DER encoding of a `SubjectPublicKeyInfo` structure
    /// holding the public half of the key.  Symmetric keys have no public
    /// half and fail with `UnsupportedKeyFormat`.
    pub fn export_spki(&self, ec: &dyn Ec) -> Result<Vec<u8>, Error> {
        match self {
            KeyMaterial::Rsa(key) => key.subject_public_key_info_der(),
            KeyMaterial::Ec(curve, key) => {
                let point = ec.public_key(*curve, key)?;
                ec::subject_public_key_info_der(*curve, &point)
            }
            KeyMaterial::Aes(_) | KeyMaterial::Hmac(_) => {
                Err(ks_err!(UnsupportedKeyFormat, "no public key for symmetric algorithm"))
            }
        }
    }
}

impl core::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "KeyMaterial::{:?}(...)", self.algorithm())
    }
}

/// Return the nonce to use for a cipher operation: the caller-provided nonce
/// if there is one (checking its length), otherwise `size` fresh random bytes.
pub fn nonce(
    size: usize,
    caller_nonce: Option<&Vec<u8>>,
    rng: &mut dyn Rng,
) -> Result<Vec<u8>, Error> {
    match caller_nonce {
        Some(n) => {
            if n.len() == size {
                Ok(n.clone())
            } else {
                Err(ks_err!(InvalidNonce, "want {} byte nonce, got {}", size, n.len()))
            }
        }
        None => {
            let mut n = alloc::vec![0; size];
            rng.fill_bytes(&mut n);
            Ok(n)
        }
    }
}
