//! ECDSA implementation based on BoringSSL.

use crate::{digest_into_openssl, openssl_err, openssl_err_or, ossl};
use core::ops::DerefMut;
use sks_common::{
    crypto,
    crypto::ec::{self, Key},
    ks_err, Error,
};
use sks_wire::{Digest, EcCurve};

/// [`crypto::Ec`] implementation based on BoringSSL.
pub struct BoringEc;

impl crypto::Ec for BoringEc {
    fn generate_key(
        &self,
        _rng: &mut dyn crypto::Rng,
        curve: EcCurve,
    ) -> Result<crypto::KeyMaterial, Error> {
        let ec_key = ossl!(openssl::ec::EcKey::<openssl::pkey::Private>::generate(
            curve_to_group(curve)?.as_ref()
        ))?;
        let der = ossl!(ec_key.private_key_to_der())?;
        Ok(crypto::KeyMaterial::Ec(curve, Key::from_der(curve, der)))
    }

    fn import_pkcs8_key(&self, data: &[u8]) -> Result<(crypto::KeyMaterial, EcCurve), Error> {
        let pkey = openssl::pkey::PKey::private_key_from_pkcs8(data)
            .map_err(openssl_err!("failed to parse PKCS#8 EC key"))?;
        let ec_key = pkey
            .ec_key()
            .map_err(openssl_err_or!(ImportParameterMismatch, "PKCS#8 key is not EC"))?;
        let nid = ec_key
            .group()
            .curve_name()
            .ok_or_else(|| ks_err!(ImportParameterMismatch, "imported EC key has no curve name"))?;
        let curve = curve_from_nid(nid)?;
        let der = ossl!(ec_key.private_key_to_der())?;
        Ok((crypto::KeyMaterial::Ec(curve, Key::from_der(curve, der)), curve))
    }

    fn public_key(&self, curve: EcCurve, key: &ec::Key) -> Result<Vec<u8>, Error> {
        let group = curve_to_group(curve)?;
        let ec_key = ossl!(openssl::ec::EcKey::private_key_from_der(key.der_bytes()))?;
        let pt = ec_key.public_key();
        let mut bn_ctx = ossl!(openssl::bn::BigNumContext::new())?;
        ossl!(pt.to_bytes(
            group.as_ref(),
            openssl::ec::PointConversionForm::UNCOMPRESSED,
            bn_ctx.deref_mut()
        ))
    }

    fn begin_sign(
        &self,
        key: ec::Key,
        digest: Digest,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        let curve = key.curve();
        if let Some(digest) = digest_into_openssl(digest) {
            Ok(Box::new(BoringEcDigestSignOperation::new(key, digest)?))
        } else {
            Ok(Box::new(BoringEcUndigestSignOperation::new(key, curve)?))
        }
    }

    fn begin_verify(
        &self,
        key: ec::Key,
        digest: Digest,
    ) -> Result<Box<dyn crypto::VerifyOperation>, Error> {
        let curve = key.curve();
        if let Some(digest) = digest_into_openssl(digest) {
            Ok(Box::new(BoringEcDigestVerifyOperation::new(key, digest)?))
        } else {
            Ok(Box::new(BoringEcUndigestVerifyOperation::new(key, curve)?))
        }
    }
}

/// EC signing operation based on BoringSSL, when an external digest is used.
pub struct BoringEcDigestSignOperation {
    pkey: openssl::pkey::PKey<openssl::pkey::Private>,
    digest: openssl::hash::MessageDigest,
    pending_input: Vec<u8>,
}

impl BoringEcDigestSignOperation {
    fn new(key: ec::Key, digest: openssl::hash::MessageDigest) -> Result<Self, Error> {
        let ec_key = ossl!(openssl::ec::EcKey::private_key_from_der(key.der_bytes()))?;
        let pkey = ossl!(openssl::pkey::PKey::from_ec_key(ec_key))?;
        Ok(Self { pkey, digest, pending_input: Vec::new() })
    }
}

impl crypto::AccumulatingOperation for BoringEcDigestSignOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        let mut signer = ossl!(openssl::sign::Signer::new(self.digest, &self.pkey))?;
        ossl!(signer.update(&self.pending_input))?;
        let sig = ossl!(signer.sign_to_vec())?;
        Ok(sig)
    }
}

/// EC signing operation based on BoringSSL, when data is undigested.  The
/// message is truncated to the curve coordinate width.
pub struct BoringEcUndigestSignOperation {
    ec_key: openssl::ec::EcKey<openssl::pkey::Private>,
    pending_input: Vec<u8>,
    max_size: usize,
}

impl BoringEcUndigestSignOperation {
    fn new(key: ec::Key, curve: EcCurve) -> Result<Self, Error> {
        let ec_key = ossl!(openssl::ec::EcKey::private_key_from_der(key.der_bytes()))?;
        Ok(Self { ec_key, pending_input: Vec::new(), max_size: ec::coord_len(curve) })
    }
}

impl crypto::AccumulatingOperation for BoringEcUndigestSignOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        // For undigested ECDSA, data beyond the coordinate width is ignored
        // (rather than being rejected via `max_input_size()`).
        let max_extra_data = self.max_size - self.pending_input.len();
        if max_extra_data > 0 {
            let len = core::cmp::min(max_extra_data, data.len());
            self.pending_input.extend_from_slice(&data[..len]);
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        // BoringSSL doesn't support `EVP_PKEY` use without digest, so use
        // low-level ECDSA functionality.
        let sig = ossl!(openssl::ecdsa::EcdsaSig::sign(&self.pending_input, &self.ec_key))?;
        let sig = ossl!(sig.to_der())?;
        Ok(sig)
    }
}

/// EC verification operation based on BoringSSL, when an external digest is
/// used.
pub struct BoringEcDigestVerifyOperation {
    pkey: openssl::pkey::PKey<openssl::pkey::Private>,
    digest: openssl::hash::MessageDigest,
    pending_input: Vec<u8>,
}

impl BoringEcDigestVerifyOperation {
    fn new(key: ec::Key, digest: openssl::hash::MessageDigest) -> Result<Self, Error> {
        let ec_key = ossl!(openssl::ec::EcKey::private_key_from_der(key.der_bytes()))?;
        let pkey = ossl!(openssl::pkey::PKey::from_ec_key(ec_key))?;
        Ok(Self { pkey, digest, pending_input: Vec::new() })
    }
}

impl crypto::VerifyOperation for BoringEcDigestVerifyOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>, signature: &[u8]) -> Result<(), Error> {
        let mut verifier = ossl!(openssl::sign::Verifier::new(self.digest, &self.pkey))?;
        ossl!(verifier.update(&self.pending_input))?;
        match verifier.verify(signature) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ks_err!(VerificationFailed, "ECDSA signature did not verify")),
            Err(e) => Err(ks_err!(VerificationFailed, "ECDSA verification error: {:?}", e)),
        }
    }
}

/// EC verification operation based on BoringSSL, when data is undigested.
pub struct BoringEcUndigestVerifyOperation {
    ec_key: openssl::ec::EcKey<openssl::pkey::Private>,
    pending_input: Vec<u8>,
    max_size: usize,
}

impl BoringEcUndigestVerifyOperation {
    fn new(key: ec::Key, curve: EcCurve) -> Result<Self, Error> {
        let ec_key = ossl!(openssl::ec::EcKey::private_key_from_der(key.der_bytes()))?;
        Ok(Self { ec_key, pending_input: Vec::new(), max_size: ec::coord_len(curve) })
    }
}

impl crypto::VerifyOperation for BoringEcUndigestVerifyOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        let max_extra_data = self.max_size - self.pending_input.len();
        if max_extra_data > 0 {
            let len = core::cmp::min(max_extra_data, data.len());
            self.pending_input.extend_from_slice(&data[..len]);
        }
        Ok(())
    }

    fn finish(self: Box<Self>, signature: &[u8]) -> Result<(), Error> {
        let sig = openssl::ecdsa::EcdsaSig::from_der(signature)
            .map_err(openssl_err_or!(VerificationFailed, "malformed ECDSA signature"))?;
        match sig.verify(&self.pending_input, &self.ec_key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ks_err!(VerificationFailed, "ECDSA signature did not verify")),
            Err(e) => Err(ks_err!(VerificationFailed, "ECDSA verification error: {:?}", e)),
        }
    }
}

fn curve_to_group(curve: EcCurve) -> Result<openssl::ec::EcGroup, Error> {
    use openssl::nid::Nid;
    openssl::ec::EcGroup::from_curve_name(match curve {
        EcCurve::P224 => Nid::SECP224R1,
        EcCurve::P256 => Nid::X9_62_PRIME256V1,
        EcCurve::P384 => Nid::SECP384R1,
        EcCurve::P521 => Nid::SECP521R1,
    })
    .map_err(openssl_err!("failed to determine EcGroup"))
}

fn curve_from_nid(nid: openssl::nid::Nid) -> Result<EcCurve, Error> {
    use openssl::nid::Nid;
    match nid {
        Nid::SECP224R1 => Ok(EcCurve::P224),
        Nid::X9_62_PRIME256V1 => Ok(EcCurve::P256),
        Nid::SECP384R1 => Ok(EcCurve::P384),
        Nid::SECP521R1 => Ok(EcCurve::P521),
        nid => Err(ks_err!(ImportParameterMismatch, "unsupported curve {:?}", nid)),
    }
}
