//! Traits representing abstractions of cryptographic functionality.

use super::*;
use crate::Error;
use alloc::boxed::Box;
use alloc::vec;
use sks_wire::{DateTime, Digest, EcCurve, KeySizeInBits, RsaExponent};

/// Combined collection of trait implementations that must be provided.
pub struct Implementation {
    /// AES implementation.
    pub aes: Box<dyn Aes>,

    /// RSA implementation.
    pub rsa: Box<dyn Rsa>,

    /// EC implementation.
    pub ec: Box<dyn Ec>,

    /// HMAC implementation.
    pub hmac: Box<dyn Hmac>,

    /// A constant-time equality implementation.
    pub compare: Box<dyn ConstTimeEq>,
}

/// Abstraction of a random number generator that is cryptographically secure
/// and which accepts additional entropy to be mixed in.
pub trait Rng: Send {
    /// Add entropy to the generator's pool.
    fn add_entropy(&mut self, data: &[u8]);
    /// Generate random data.
    fn fill_bytes(&mut self, dest: &mut [u8]);
    /// Return a random `u64` value.
    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }
}

/// Abstraction of constant-time comparisons, for use in cryptographic
/// contexts where timing attacks need to be avoided.
pub trait ConstTimeEq: Send + Sync {
    /// Indicate whether arguments are the same.
    fn eq(&self, left: &[u8], right: &[u8]) -> bool;
    /// Indicate whether arguments are different.
    fn ne(&self, left: &[u8], right: &[u8]) -> bool {
        !self.eq(left, right)
    }
}

/// Abstraction of a wall clock, used to timestamp key creation.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since an epoch fixed for the deployment.
    fn now(&self) -> DateTime;
}

/// Abstraction of AES functionality.
pub trait Aes: Send + Sync {
    /// Generate an AES key.  The default implementation fills with random data.
    fn generate_key(&self, rng: &mut dyn Rng, variant: aes::Variant) -> Result<KeyMaterial, Error> {
        Ok(match variant {
            aes::Variant::Aes128 => {
                let mut key = [0; 16];
                rng.fill_bytes(&mut key[..]);
                KeyMaterial::Aes(aes::Key::Aes128(key))
            }
            aes::Variant::Aes192 => {
                let mut key = [0; 24];
                rng.fill_bytes(&mut key[..]);
                KeyMaterial::Aes(aes::Key::Aes192(key))
            }
            aes::Variant::Aes256 => {
                let mut key = [0; 32];
                rng.fill_bytes(&mut key[..]);
                KeyMaterial::Aes(aes::Key::Aes256(key))
            }
        })
    }

    /// Import an AES key, also returning the key size in bits.
    fn import_key(&self, data: &[u8]) -> Result<(KeyMaterial, KeySizeInBits), Error> {
        let aes_key = aes::Key::new_from(data)?;
        let key_size = aes_key.size();
        Ok((KeyMaterial::Aes(aes_key), key_size))
    }

    /// Create an AES cipher operation.  For block mode operations with no
    /// padding ([`aes::CipherMode::EcbNoPadding`] and
    /// [`aes::CipherMode::CbcNoPadding`]) the operation implementation must
    /// reject (with `InvalidInputLength`) total input that is not a multiple
    /// of the block size.
    fn begin(
        &self,
        key: aes::Key,
        mode: aes::CipherMode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn EmittingOperation>, Error>;

    /// Create an AES AEAD operation (GCM, or OCB for legacy blobs).
    fn begin_aead(
        &self,
        key: aes::Key,
        mode: aes::AeadMode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn AadOperation>, Error>;
}

/// Abstraction of HMAC functionality.
pub trait Hmac: Send + Sync {
    /// Generate an HMAC key.
    fn generate_key(&self, rng: &mut dyn Rng, key_size: KeySizeInBits) -> Result<KeyMaterial, Error> {
        hmac::valid_size(key_size)?;
        let mut key = vec![0; (key_size.0 / 8) as usize];
        rng.fill_bytes(&mut key);
        Ok(KeyMaterial::Hmac(hmac::Key::new(key)))
    }

    /// Import an HMAC key, also returning the key size in bits.
    fn import_key(&self, data: &[u8]) -> Result<(KeyMaterial, KeySizeInBits), Error> {
        let hmac_key = hmac::Key::new_from(data);
        let key_size = hmac_key.size();
        hmac::valid_size(key_size)?;
        Ok((KeyMaterial::Hmac(hmac_key), key_size))
    }

    /// Create an HMAC operation.  Implementations can assume that `key` has
    /// a byte-aligned length within the supported range and that `digest` is
    /// not [`Digest::None`].
    fn begin(&self, key: hmac::Key, digest: Digest) -> Result<Box<dyn AccumulatingOperation>, Error>;
}

/// Abstraction of RSA functionality.
pub trait Rsa: Send + Sync {
    /// Generate an RSA key.
    fn generate_key(
        &self,
        rng: &mut dyn Rng,
        key_size: KeySizeInBits,
        pub_exponent: RsaExponent,
    ) -> Result<KeyMaterial, Error>;

    /// Import an RSA key in PKCS#8 format, also returning the key size in
    /// bits and the public exponent.
    fn import_pkcs8_key(
        &self,
        data: &[u8],
    ) -> Result<(KeyMaterial, KeySizeInBits, RsaExponent), Error>;

    /// Create an RSA signing operation.  For
    /// [`rsa::SignMode::Pkcs1_1_5Padding`] with [`Digest::None`] the
    /// implementation should reject (with `InvalidInputLength`) accumulated
    /// input larger than the key size less overhead
    /// ([`rsa::PKCS1_UNDIGESTED_SIGNATURE_PADDING_OVERHEAD`]).
    fn begin_sign(
        &self,
        key: rsa::Key,
        mode: rsa::SignMode,
    ) -> Result<Box<dyn AccumulatingOperation>, Error>;

    /// Create an RSA verification operation using the public half of `key`.
    fn begin_verify(
        &self,
        key: rsa::Key,
        mode: rsa::SignMode,
    ) -> Result<Box<dyn VerifyOperation>, Error>;

    /// Create an RSA encryption operation using the public half of `key`.
    fn begin_encrypt(
        &self,
        key: rsa::Key,
        mode: rsa::EncryptionMode,
    ) -> Result<Box<dyn AccumulatingOperation>, Error>;

    /// Create an RSA decryption operation.
    fn begin_decrypt(
        &self,
        key: rsa::Key,
        mode: rsa::EncryptionMode,
    ) -> Result<Box<dyn AccumulatingOperation>, Error>;
}

/// Abstraction of ECDSA functionality.
pub trait Ec: Send + Sync {
    /// Generate an EC key for a NIST curve.
    fn generate_key(&self, rng: &mut dyn Rng, curve: EcCurve) -> Result<KeyMaterial, Error>;

    /// Import an EC key in PKCS#8 format, also returning the curve deduced
    /// from the encoded key.
    fn import_pkcs8_key(&self, data: &[u8]) -> Result<(KeyMaterial, EcCurve), Error>;

    /// Return the public key that corresponds to the provided private `key`,
    /// as a SEC-1 encoded uncompressed point.
    fn public_key(&self, curve: EcCurve, key: &ec::Key) -> Result<Vec<u8>, Error>;

    /// Create an EC signing operation.
    fn begin_sign(&self, key: ec::Key, digest: Digest)
        -> Result<Box<dyn AccumulatingOperation>, Error>;

    /// Create an EC verification operation using the public half of `key`.
    fn begin_verify(&self, key: ec::Key, digest: Digest)
        -> Result<Box<dyn VerifyOperation>, Error>;
}

/// Abstraction of an in-progress operation that emits data as it progresses.
pub trait EmittingOperation: Send {
    /// Update operation with data.
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error>;

    /// Complete operation, consuming `self`.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error>;
}

/// Abstraction of an in-progress AEAD operation.
pub trait AadOperation: Send {
    /// Absorb additional authenticated data.  Callers ensure all
    /// `update_aad()` calls happen before any call to `update()`.
    fn update_aad(&mut self, aad: &[u8]) -> Result<(), Error>;

    /// Update operation with data.
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error>;

    /// Complete the operation, consuming `self`.  For encryption `tag` must
    /// be `None` and the result carries the computed authentication tag; for
    /// decryption the caller supplies the expected tag and a mismatch fails
    /// with `VerificationFailed`.
    fn finish(self: Box<Self>, tag: Option<&[u8]>) -> Result<(Vec<u8>, Option<Vec<u8>>), Error>;
}

/// Abstraction of an in-progress operation that only emits data when it
/// completes.
pub trait AccumulatingOperation: Send {
    /// Maximum size of accumulated input, if limited.
    fn max_input_size(&self) -> Option<usize> {
        None
    }

    /// Update operation with data.
    fn update(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Complete operation, consuming `self`.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error>;
}

/// Abstraction of an in-progress signature verification operation.
pub trait VerifyOperation: Send {
    /// Maximum size of accumulated input, if limited.
    fn max_input_size(&self) -> Option<usize> {
        None
    }

    /// Update operation with message data.
    fn update(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Complete the operation, consuming `self`, checking `signature`
    /// against the accumulated message.  Fails with `VerificationFailed` on
    /// mismatch.
    fn finish(self: Box<Self>, signature: &[u8]) -> Result<(), Error>;
}
