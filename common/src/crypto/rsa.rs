//! Functionality related to RSA.

use crate::{ks_err, tag, Error};
use alloc::vec::Vec;
use der::{Decode, Encode};
use pkcs1::RsaPrivateKey;
use sks_wire::{Digest, KeyParam, PaddingMode};
use spki::{AlgorithmIdentifier, SubjectPublicKeyInfo};
use zeroize::ZeroizeOnDrop;

/// Overhead for PKCS#1 v1.5 signature padding of undigested messages.  Digested
/// messages have additional overhead, for the digest algorithmIdentifier
/// required by PKCS#1.
pub const PKCS1_UNDIGESTED_SIGNATURE_PADDING_OVERHEAD: usize = 11;

/// OID value for PKCS#1-encoded RSA keys held in PKCS#8 and X.509; see RFC 3447 A.1.
pub const X509_OID: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// An RSA key, in the form of an ASN.1 DER encoding of a PKCS#1
/// `RSAPrivateKey` structure, as specified by RFC 3447 sections A.1.2 and 3.2.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct Key(pub Vec<u8>);

impl Key {
    /// Return the ASN.1 DER encoding of a `SubjectPublicKeyInfo` structure
    /// (RFC 5280 section 4.1) holding the public key:
    ///
    /// - The `AlgorithmIdentifier` has an algorithm OID of 1.2.840.113549.1.1.1.
    /// - The `AlgorithmIdentifier` has `NULL` parameters.
    /// - The `subjectPublicKey` bit string holds an ASN.1 DER-encoded
    ///   `RSAPublicKey` (RFC 3279 section 2.3.1).
    pub fn subject_public_key_info_der(&self) -> Result<Vec<u8>, Error> {
        let rsa_pvt_key = RsaPrivateKey::from_der(self.0.as_slice())?;
        let rsa_pub_key = rsa_pvt_key.public_key();
        let mut pub_key_data = Vec::new();
        rsa_pub_key.encode_to_vec(&mut pub_key_data)?;
        let spki = SubjectPublicKeyInfo {
            algorithm: AlgorithmIdentifier { oid: X509_OID, parameters: Some(der::AnyRef::NULL) },
            subject_public_key: &pub_key_data,
        };
        Ok(spki.to_vec()?)
    }

    /// Size of the key (modulus) in bytes.
    pub fn size(&self) -> usize {
        let rsa_pvt_key = match RsaPrivateKey::from_der(self.0.as_slice()) {
            Ok(k) => k,
            Err(e) => {
                log::error!("failed to determine RSA key length: {:?}", e);
                return 0;
            }
        };
        u32::from(rsa_pvt_key.modulus.len()) as usize
    }
}

/// RSA signature mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    NoPadding,
    PssPadding(Digest),
    Pkcs1_1_5Padding(Digest),
}

impl SignMode {
    /// Determine the [`SignMode`] from parameters.
    pub fn new(params: &[KeyParam]) -> Result<Self, Error> {
        let padding = tag::get_padding_mode(params)?;
        match padding {
            PaddingMode::None => Ok(SignMode::NoPadding),
            PaddingMode::RsaPss => {
                let digest = tag::get_digest(params)?;
                Ok(SignMode::PssPadding(digest))
            }
            PaddingMode::RsaPkcs115Sign => {
                let digest = tag::get_digest(params)?;
                Ok(SignMode::Pkcs1_1_5Padding(digest))
            }
            _ => Err(ks_err!(
                UnsupportedPaddingMode,
                "padding mode {:?} not supported for RSA signing",
                padding
            )),
        }
    }
}

/// RSA encryption/decryption mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    NoPadding,
    OaepPadding(Digest),
    Pkcs1_1_5Padding,
}

impl EncryptionMode {
    /// Determine the [`EncryptionMode`] from parameters.
    pub fn new(params: &[KeyParam]) -> Result<Self, Error> {
        let padding = tag::get_padding_mode(params)?;
        match padding {
            PaddingMode::None => Ok(EncryptionMode::NoPadding),
            PaddingMode::RsaOaep => {
                let digest = tag::get_digest(params)?;
                if digest == Digest::None {
                    return Err(ks_err!(IncompatibleDigest, "digest required for RSA-OAEP"));
                }
                Ok(EncryptionMode::OaepPadding(digest))
            }
            PaddingMode::RsaPkcs115Encrypt => Ok(EncryptionMode::Pkcs1_1_5Padding),
            _ => Err(ks_err!(
                UnsupportedPaddingMode,
                "padding mode {:?} not supported for RSA encryption",
                padding
            )),
        }
    }
}
