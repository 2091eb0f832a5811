//! RSA implementation based on BoringSSL.

use crate::{digest_into_openssl, openssl_err, openssl_err_or, ossl};
use sks_common::crypto::rsa::{
    EncryptionMode, SignMode, PKCS1_UNDIGESTED_SIGNATURE_PADDING_OVERHEAD,
};
use sks_common::{crypto, ks_err, Error};
use sks_wire::{Digest, KeySizeInBits, RsaExponent};

/// Smallest allowed public exponent.
const MIN_RSA_EXPONENT: RsaExponent = RsaExponent(3);

/// [`crypto::Rsa`] implementation based on BoringSSL.
pub struct BoringRsa;

impl crypto::Rsa for BoringRsa {
    fn generate_key(
        &self,
        _rng: &mut dyn crypto::Rng,
        key_size: KeySizeInBits,
        pub_exponent: RsaExponent,
    ) -> Result<crypto::KeyMaterial, Error> {
        // Reject some obviously-wrong parameter values.
        if pub_exponent < MIN_RSA_EXPONENT {
            return Err(ks_err!(
                InvalidArgument,
                "invalid public exponent, {:?} < {:?}",
                pub_exponent,
                MIN_RSA_EXPONENT
            ));
        }
        if pub_exponent.0 % 2 != 1 {
            return Err(ks_err!(
                InvalidArgument,
                "invalid public exponent {:?} (even number)",
                pub_exponent
            ));
        }
        let exponent = openssl::bn::BigNum::from_slice(&pub_exponent.0.to_be_bytes()[..])
            .map_err(openssl_err!("failed to create BigNum for exponent {:?}", pub_exponent))?;

        let rsa_key =
            openssl::rsa::Rsa::generate_with_e(key_size.0, &exponent).map_err(openssl_err!(
                "failed to generate RSA key size {:?} exponent {:?}",
                key_size,
                pub_exponent
            ))?;
        let asn1_data = ossl!(rsa_key.private_key_to_der())?;
        Ok(crypto::KeyMaterial::Rsa(crypto::rsa::Key(asn1_data)))
    }

    fn import_pkcs8_key(
        &self,
        data: &[u8],
    ) -> Result<(crypto::KeyMaterial, KeySizeInBits, RsaExponent), Error> {
        let pkey = openssl::pkey::PKey::private_key_from_pkcs8(data)
            .map_err(openssl_err!("failed to parse PKCS#8 RSA key"))?;
        let rsa_key = pkey
            .rsa()
            .map_err(openssl_err_or!(ImportParameterMismatch, "PKCS#8 key is not RSA"))?;
        let key_size = KeySizeInBits(rsa_key.size() * 8);
        let e = rsa_key.e().to_vec(); // big-endian
        if e.len() > 8 {
            return Err(ks_err!(ImportParameterMismatch, "public exponent too large"));
        }
        let mut exponent = 0u64;
        for byte in e {
            exponent = (exponent << 8) | byte as u64;
        }
        let asn1_data = ossl!(rsa_key.private_key_to_der())?;
        Ok((
            crypto::KeyMaterial::Rsa(crypto::rsa::Key(asn1_data)),
            key_size,
            RsaExponent(exponent),
        ))
    }

    fn begin_sign(
        &self,
        key: crypto::rsa::Key,
        mode: SignMode,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        match mode {
            SignMode::NoPadding | SignMode::Pkcs1_1_5Padding(Digest::None) => {
                Ok(Box::new(BoringRsaUndigestSignOperation::new(key, mode)?))
            }
            SignMode::Pkcs1_1_5Padding(digest) | SignMode::PssPadding(digest) => {
                let padding = match mode {
                    SignMode::Pkcs1_1_5Padding(_) => openssl::rsa::Padding::PKCS1,
                    _ => openssl::rsa::Padding::PKCS1_PSS,
                };
                if let Some(digest) = digest_into_openssl(digest) {
                    Ok(Box::new(BoringRsaDigestSignOperation::new(key, mode, digest, padding)?))
                } else {
                    Err(ks_err!(IncompatibleDigest, "no digest provided for mode {:?}", mode))
                }
            }
        }
    }

    fn begin_verify(
        &self,
        key: crypto::rsa::Key,
        mode: SignMode,
    ) -> Result<Box<dyn crypto::VerifyOperation>, Error> {
        match mode {
            SignMode::NoPadding | SignMode::Pkcs1_1_5Padding(Digest::None) => {
                Ok(Box::new(BoringRsaUndigestVerifyOperation::new(key, mode)?))
            }
            SignMode::Pkcs1_1_5Padding(digest) | SignMode::PssPadding(digest) => {
                let padding = match mode {
                    SignMode::Pkcs1_1_5Padding(_) => openssl::rsa::Padding::PKCS1,
                    _ => openssl::rsa::Padding::PKCS1_PSS,
                };
                if let Some(digest) = digest_into_openssl(digest) {
                    Ok(Box::new(BoringRsaDigestVerifyOperation::new(key, mode, digest, padding)?))
                } else {
                    Err(ks_err!(IncompatibleDigest, "no digest provided for mode {:?}", mode))
                }
            }
        }
    }

    fn begin_encrypt(
        &self,
        key: crypto::rsa::Key,
        mode: EncryptionMode,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        let rsa_key = ossl!(openssl::rsa::Rsa::private_key_from_der(&key.0))?;
        let key_size = rsa_key.size() as usize;
        let max_size = match mode {
            EncryptionMode::NoPadding => Some(key_size),
            EncryptionMode::Pkcs1_1_5Padding => Some(key_size - 11),
            EncryptionMode::OaepPadding(_) => None, // failure surfaces at finish
        };
        Ok(Box::new(BoringRsaEncryptOperation {
            rsa_key,
            mode,
            pending_input: Vec::new(),
            key_size,
            max_size,
        }))
    }

    fn begin_decrypt(
        &self,
        key: crypto::rsa::Key,
        mode: EncryptionMode,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        let max_size = key.size();
        Ok(Box::new(BoringRsaDecryptOperation { key, mode, pending_input: Vec::new(), max_size }))
    }
}

/// RSA decryption operation based on BoringSSL.
pub struct BoringRsaDecryptOperation {
    key: crypto::rsa::Key,
    mode: EncryptionMode,
    pending_input: Vec<u8>, // Limited to size of key (`max_size` below).
    max_size: usize,
}

impl crypto::AccumulatingOperation for BoringRsaDecryptOperation {
    fn max_input_size(&self) -> Option<usize> {
        Some(self.max_size)
    }

    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, Error> {
        let rsa_key = ossl!(openssl::rsa::Rsa::private_key_from_der(&self.key.0))?;
        let priv_key = ossl!(openssl::pkey::PKey::from_rsa(rsa_key))?;
        let mut decrypter = ossl!(openssl::encrypt::Decrypter::new(&priv_key))?;

        let padding = match self.mode {
            EncryptionMode::NoPadding => openssl::rsa::Padding::NONE,
            EncryptionMode::OaepPadding(_) => openssl::rsa::Padding::PKCS1_OAEP,
            EncryptionMode::Pkcs1_1_5Padding => openssl::rsa::Padding::PKCS1,
        };
        decrypter
            .set_rsa_padding(padding)
            .map_err(openssl_err!("failed to set padding for {:?}", self.mode))?;

        if let EncryptionMode::OaepPadding(digest) = self.mode {
            let md = digest_into_openssl(digest).ok_or_else(|| {
                ks_err!(UnknownError, "Digest::None not allowed for RSA-OAEP digest")
            })?;
            decrypter
                .set_rsa_oaep_md(md)
                .map_err(openssl_err!("failed to set digest {:?}", digest))?;
            decrypter
                .set_rsa_mgf1_md(md)
                .map_err(openssl_err!("failed to set MGF digest {:?}", digest))?;
        }

        let buf_len = ossl!(decrypter.decrypt_len(&self.pending_input))?;
        let mut output = vec![0; buf_len];

        if self.mode == EncryptionMode::NoPadding && self.pending_input.len() < buf_len {
            self.pending_input = zero_pad_left(&self.pending_input, buf_len);
        }

        let actual_len = decrypter
            .decrypt(&self.pending_input, &mut output)
            .map_err(openssl_err_or!(InvalidArgument, "failed to decrypt"))?;
        output.truncate(actual_len);

        Ok(output)
    }
}

/// RSA encryption operation based on BoringSSL, using the public half of the
/// key.
pub struct BoringRsaEncryptOperation {
    rsa_key: openssl::rsa::Rsa<openssl::pkey::Private>,
    mode: EncryptionMode,
    pending_input: Vec<u8>,
    key_size: usize,
    max_size: Option<usize>,
}

impl crypto::AccumulatingOperation for BoringRsaEncryptOperation {
    fn max_input_size(&self) -> Option<usize> {
        self.max_size
    }

    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        let this = *self;
        let mut output = vec![0; this.key_size];
        match this.mode {
            EncryptionMode::NoPadding => {
                // Deterministic raw RSA; message must fill the modulus width.
                if this.pending_input.len() != this.key_size {
                    return Err(ks_err!(
                        InvalidInputLength,
                        "raw RSA message len {} != key size {}",
                        this.pending_input.len(),
                        this.key_size
                    ));
                }
                let len = ossl!(this.rsa_key.public_encrypt(
                    &this.pending_input,
                    &mut output,
                    openssl::rsa::Padding::NONE
                ))?;
                output.truncate(len);
            }
            EncryptionMode::Pkcs1_1_5Padding => {
                let len = ossl!(this.rsa_key.public_encrypt(
                    &this.pending_input,
                    &mut output,
                    openssl::rsa::Padding::PKCS1
                ))?;
                output.truncate(len);
            }
            EncryptionMode::OaepPadding(digest) => {
                let pkey = ossl!(openssl::pkey::PKey::from_rsa(this.rsa_key))?;
                let mut encrypter = ossl!(openssl::encrypt::Encrypter::new(&pkey))?;
                ossl!(encrypter.set_rsa_padding(openssl::rsa::Padding::PKCS1_OAEP))?;
                let md = digest_into_openssl(digest).ok_or_else(|| {
                    ks_err!(UnknownError, "Digest::None not allowed for RSA-OAEP digest")
                })?;
                ossl!(encrypter.set_rsa_oaep_md(md))?;
                ossl!(encrypter.set_rsa_mgf1_md(md))?;
                let buf_len = encrypter
                    .encrypt_len(&this.pending_input)
                    .map_err(openssl_err_or!(InvalidInputLength, "message too large for OAEP"))?;
                let mut buf = vec![0; buf_len];
                let len = encrypter
                    .encrypt(&this.pending_input, &mut buf)
                    .map_err(openssl_err_or!(InvalidInputLength, "message too large for OAEP"))?;
                buf.truncate(len);
                output = buf;
            }
        }
        Ok(output)
    }
}

/// RSA signing operation based on BoringSSL, for when an external digest is
/// used.
pub struct BoringRsaDigestSignOperation {
    pkey: openssl::pkey::PKey<openssl::pkey::Private>,
    salt_len: Option<openssl::sign::RsaPssSaltlen>,
    digest: openssl::hash::MessageDigest,
    padding: openssl::rsa::Padding,
    pending_input: Vec<u8>,
}

impl BoringRsaDigestSignOperation {
    fn new(
        key: crypto::rsa::Key,
        mode: SignMode,
        digest: openssl::hash::MessageDigest,
        padding: openssl::rsa::Padding,
    ) -> Result<Self, Error> {
        let rsa_key = ossl!(openssl::rsa::Rsa::private_key_from_der(&key.0))?;
        let pkey = ossl!(openssl::pkey::PKey::from_rsa(rsa_key))?;
        // PSS salt is sized to whatever the key has room for, so that keys
        // only slightly larger than the digest still work.
        let salt_len = match mode {
            SignMode::PssPadding(_) => Some(openssl::sign::RsaPssSaltlen::MAXIMUM_LENGTH),
            _ => None,
        };
        Ok(Self { pkey, salt_len, digest, padding, pending_input: Vec::new() })
    }
}

impl crypto::AccumulatingOperation for BoringRsaDigestSignOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        let mut signer = ossl!(openssl::sign::Signer::new(self.digest, &self.pkey))?;
        signer
            .set_rsa_padding(self.padding)
            .map_err(openssl_err!("failed to set padding mode {:?}", self.padding))?;
        if let Some(salt_len) = self.salt_len {
            ossl!(signer.set_rsa_pss_saltlen(salt_len))?;
        }
        ossl!(signer.update(&self.pending_input))?;
        let sig = ossl!(signer.sign_to_vec())?;
        Ok(sig)
    }
}

/// RSA verification operation based on BoringSSL, for when an external digest
/// is used.
pub struct BoringRsaDigestVerifyOperation {
    pkey: openssl::pkey::PKey<openssl::pkey::Private>,
    salt_len: Option<openssl::sign::RsaPssSaltlen>,
    digest: openssl::hash::MessageDigest,
    padding: openssl::rsa::Padding,
    pending_input: Vec<u8>,
}

impl BoringRsaDigestVerifyOperation {
    fn new(
        key: crypto::rsa::Key,
        mode: SignMode,
        digest: openssl::hash::MessageDigest,
        padding: openssl::rsa::Padding,
    ) -> Result<Self, Error> {
        let rsa_key = ossl!(openssl::rsa::Rsa::private_key_from_der(&key.0))?;
        let pkey = ossl!(openssl::pkey::PKey::from_rsa(rsa_key))?;
        let salt_len = match mode {
            SignMode::PssPadding(_) => Some(openssl::sign::RsaPssSaltlen::MAXIMUM_LENGTH),
            _ => None,
        };
        Ok(Self { pkey, salt_len, digest, padding, pending_input: Vec::new() })
    }
}

impl crypto::VerifyOperation for BoringRsaDigestVerifyOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>, signature: &[u8]) -> Result<(), Error> {
        let mut verifier = ossl!(openssl::sign::Verifier::new(self.digest, &self.pkey))?;
        verifier
            .set_rsa_padding(self.padding)
            .map_err(openssl_err!("failed to set padding mode {:?}", self.padding))?;
        if let Some(salt_len) = self.salt_len {
            ossl!(verifier.set_rsa_pss_saltlen(salt_len))?;
        }
        ossl!(verifier.update(&self.pending_input))?;
        match verifier.verify(signature) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ks_err!(VerificationFailed, "RSA signature did not verify")),
            Err(e) => Err(ks_err!(VerificationFailed, "RSA verification error: {:?}", e)),
        }
    }
}

/// RSA signing operation based on BoringSSL, for undigested data.
pub struct BoringRsaUndigestSignOperation {
    rsa_key: openssl::rsa::Rsa<openssl::pkey::Private>,
    raw: bool,
    pending_input: Vec<u8>,
    max_size: usize,
}

impl BoringRsaUndigestSignOperation {
    fn new(key: crypto::rsa::Key, mode: SignMode) -> Result<Self, Error> {
        let rsa_key = ossl!(openssl::rsa::Rsa::private_key_from_der(&key.0))?;
        let (raw, max_size) = match mode {
            SignMode::NoPadding => (true, rsa_key.size() as usize),
            SignMode::Pkcs1_1_5Padding(Digest::None) => {
                (false, rsa_key.size() as usize - PKCS1_UNDIGESTED_SIGNATURE_PADDING_OVERHEAD)
            }
            _ => return Err(ks_err!(UnsupportedPaddingMode, "sign undigested mode {:?}", mode)),
        };
        Ok(Self { rsa_key, raw, pending_input: Vec::new(), max_size })
    }
}

impl crypto::AccumulatingOperation for BoringRsaUndigestSignOperation {
    fn max_input_size(&self) -> Option<usize> {
        Some(self.max_size)
    }

    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        // OK to accumulate data as there is a size limit.
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; self.rsa_key.size() as usize];
        if self.raw {
            // Raw RSA requires the message to fill the modulus width exactly,
            // and to be numerically smaller than the modulus; both violations
            // surface here rather than at update().
            if self.pending_input.len() != self.max_size {
                return Err(ks_err!(
                    UnknownError,
                    "raw RSA message len {} != key size {}",
                    self.pending_input.len(),
                    self.max_size
                ));
            }
            let len = self
                .rsa_key
                .private_encrypt(&self.pending_input, &mut buf, openssl::rsa::Padding::NONE)
                .map_err(openssl_err!("failed to sign raw message"))?;
            buf.truncate(len);
        } else {
            let len = ossl!(self.rsa_key.private_encrypt(
                &self.pending_input,
                &mut buf,
                openssl::rsa::Padding::PKCS1
            ))?;
            buf.truncate(len);
        }
        Ok(buf)
    }
}

/// RSA verification operation based on BoringSSL, for undigested data.
pub struct BoringRsaUndigestVerifyOperation {
    rsa_key: openssl::rsa::Rsa<openssl::pkey::Private>,
    raw: bool,
    pending_input: Vec<u8>,
    max_size: usize,
}

impl BoringRsaUndigestVerifyOperation {
    fn new(key: crypto::rsa::Key, mode: SignMode) -> Result<Self, Error> {
        let rsa_key = ossl!(openssl::rsa::Rsa::private_key_from_der(&key.0))?;
        let (raw, max_size) = match mode {
            SignMode::NoPadding => (true, rsa_key.size() as usize),
            SignMode::Pkcs1_1_5Padding(Digest::None) => {
                (false, rsa_key.size() as usize - PKCS1_UNDIGESTED_SIGNATURE_PADDING_OVERHEAD)
            }
            _ => return Err(ks_err!(UnsupportedPaddingMode, "verify undigested mode {:?}", mode)),
        };
        Ok(Self { rsa_key, raw, pending_input: Vec::new(), max_size })
    }
}

impl crypto::VerifyOperation for BoringRsaUndigestVerifyOperation {
    fn max_input_size(&self) -> Option<usize> {
        Some(self.max_size)
    }

    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>, signature: &[u8]) -> Result<(), Error> {
        let key_size = self.rsa_key.size() as usize;
        let mut recovered = vec![0; key_size];
        let padding = if self.raw { openssl::rsa::Padding::NONE } else { openssl::rsa::Padding::PKCS1 };
        let len = self
            .rsa_key
            .public_decrypt(signature, &mut recovered, padding)
            .map_err(openssl_err_or!(VerificationFailed, "failed to recover signature"))?;
        recovered.truncate(len);
        let matches = if self.raw {
            recovered == zero_pad_left(&self.pending_input, key_size)
        } else {
            recovered == self.pending_input
        };
        if matches {
            Ok(())
        } else {
            Err(ks_err!(VerificationFailed, "RSA signature did not verify"))
        }
    }
}

fn zero_pad_left(data: &[u8], len: usize) -> Vec<u8> {
    let mut dest = vec![0; len];
    dest[len - data.len()..].copy_from_slice(data);
    dest
}
