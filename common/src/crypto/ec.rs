//! Functionality related to ECDSA.

use crate::{ks_err, Error};
use alloc::vec::Vec;
use der::Encode;
use sks_wire::{EcCurve, KeySizeInBits};
use spki::{AlgorithmIdentifier, SubjectPublicKeyInfo};
use zeroize::ZeroizeOnDrop;

/// OID value for general-use NIST EC keys held in PKCS#8 and X.509; see RFC 5480 s2.1.1.
pub const X509_OID: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// OID value for the NIST P-224 curve; see RFC 5480 s2.1.1.1.
pub const P224_OID: der::asn1::ObjectIdentifier = der::asn1::ObjectIdentifier::new_unwrap("1.3.132.0.33");

/// OID value for the NIST P-256 curve; see RFC 5480 s2.1.1.1.
pub const P256_OID: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");

/// OID value for the NIST P-384 curve; see RFC 5480 s2.1.1.1.
pub const P384_OID: der::asn1::ObjectIdentifier = der::asn1::ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// OID value for the NIST P-521 curve; see RFC 5480 s2.1.1.1.
pub const P521_OID: der::asn1::ObjectIdentifier = der::asn1::ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// A NIST EC key, in the form of an ASN.1 DER encoding of a SEC-1
/// `ECPrivateKey` structure (RFC 5915 s3).
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct NistKey(pub Vec<u8>);

/// An EC private key on a NIST curve.
#[derive(Clone, PartialEq, Eq)]
pub enum Key {
    P224(NistKey),
    P256(NistKey),
    P384(NistKey),
    P521(NistKey),
}

impl Key {
    /// Return the curve of the key.
    pub fn curve(&self) -> EcCurve {
        match self {
            Key::P224(_) => EcCurve::P224,
            Key::P256(_) => EcCurve::P256,
            Key::P384(_) => EcCurve::P384,
            Key::P521(_) => EcCurve::P521,
        }
    }

    /// Return the DER-encoded private key data.
    pub fn der_bytes(&self) -> &[u8] {
        match self {
            Key::P224(key) | Key::P256(key) | Key::P384(key) | Key::P521(key) => &key.0,
        }
    }

    /// Wrap DER-encoded private key data for the given curve.
    pub fn from_der(curve: EcCurve, der: Vec<u8>) -> Key {
        let key = NistKey(der);
        match curve {
            EcCurve::P224 => Key::P224(key),
            EcCurve::P256 => Key::P256(key),
            EcCurve::P384 => Key::P384(key),
            EcCurve::P521 => Key::P521(key),
        }
    }
}

/// Return the length in bytes of a coordinate on the curve.
pub fn coord_len(curve: EcCurve) -> usize {
    match curve {
        EcCurve::P224 => 28,
        EcCurve::P256 => 32,
        EcCurve::P384 => 48,
        EcCurve::P521 => 66,
    }
}

/// Map a key size in bits to the NIST curve of that size, if any.
pub fn curve_from_key_size(key_size: KeySizeInBits) -> Result<EcCurve, Error> {
    match key_size.0 {
        224 => Ok(EcCurve::P224),
        256 => Ok(EcCurve::P256),
        384 => Ok(EcCurve::P384),
        521 => Ok(EcCurve::P521),
        bits => Err(ks_err!(UnsupportedKeySize, "no NIST curve of size {} bits", bits)),
    }
}

/// Return the key size in bits of a curve.
pub fn curve_key_size(curve: EcCurve) -> KeySizeInBits {
    KeySizeInBits(match curve {
        EcCurve::P224 => 224,
        EcCurve::P256 => 256,
        EcCurve::P384 => 384,
        EcCurve::P521 => 521,
    })
}

/// Build the ASN.1 DER encoding of a `SubjectPublicKeyInfo` structure holding
/// an EC public key given as a SEC-1 encoded uncompressed `point`.  The
/// `AlgorithmIdentifier` parameters carry the curve OID (RFC 5480 s2.1.1).
pub fn subject_public_key_info_der(curve: EcCurve, point: &[u8]) -> Result<Vec<u8>, Error> {
    let curve_oid = match curve {
        EcCurve::P224 => P224_OID,
        EcCurve::P256 => P256_OID,
        EcCurve::P384 => P384_OID,
        EcCurve::P521 => P521_OID,
    };
    let spki = SubjectPublicKeyInfo {
        algorithm: AlgorithmIdentifier { oid: X509_OID, parameters: Some((&curve_oid).into()) },
        subject_public_key: point,
    };
    Ok(spki.to_vec()?)
}
