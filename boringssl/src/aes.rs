//! AES implementation based on BoringSSL.

use crate::{openssl_err, openssl_err_or, ossl};
use openssl::symm::{Cipher, Crypter};
use sks_common::{
    crypto,
    crypto::{aes, SymmetricOperation},
    ks_err, Error,
};

/// [`crypto::Aes`] implementation based on BoringSSL.
pub struct BoringAes;

impl crypto::Aes for BoringAes {
    fn begin(
        &self,
        key: aes::Key,
        mode: aes::CipherMode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn crypto::EmittingOperation>, Error> {
        let dir_mode = match dir {
            SymmetricOperation::Encrypt => openssl::symm::Mode::Encrypt,
            SymmetricOperation::Decrypt => openssl::symm::Mode::Decrypt,
        };
        let crypter = match mode {
            aes::CipherMode::EcbNoPadding | aes::CipherMode::EcbPkcs7Padding => {
                let cipher = match &key {
                    aes::Key::Aes128(_) => Cipher::aes_128_ecb(),
                    aes::Key::Aes192(_) => Cipher::aes_192_ecb(),
                    aes::Key::Aes256(_) => Cipher::aes_256_ecb(),
                };
                let mut crypter = Crypter::new(cipher, dir_mode, key.bytes(), None)
                    .map_err(openssl_err!("failed to create ECB Crypter"))?;
                crypter.pad(matches!(mode, aes::CipherMode::EcbPkcs7Padding));
                crypter
            }

            aes::CipherMode::CbcNoPadding { nonce: n }
            | aes::CipherMode::CbcPkcs7Padding { nonce: n } => {
                let cipher = match &key {
                    aes::Key::Aes128(_) => Cipher::aes_128_cbc(),
                    aes::Key::Aes192(_) => Cipher::aes_192_cbc(),
                    aes::Key::Aes256(_) => Cipher::aes_256_cbc(),
                };
                let mut crypter = Crypter::new(cipher, dir_mode, key.bytes(), Some(&n[..]))
                    .map_err(openssl_err!("failed to create CBC Crypter"))?;
                crypter.pad(matches!(mode, aes::CipherMode::CbcPkcs7Padding { .. }));
                crypter
            }

            aes::CipherMode::Ctr { nonce: n } => {
                let cipher = match &key {
                    aes::Key::Aes128(_) => Cipher::aes_128_ctr(),
                    aes::Key::Aes192(_) => Cipher::aes_192_ctr(),
                    aes::Key::Aes256(_) => Cipher::aes_256_ctr(),
                };
                Crypter::new(cipher, dir_mode, key.bytes(), Some(&n[..]))
                    .map_err(openssl_err!("failed to create CTR Crypter"))?
            }
        };

        Ok(Box::new(BoringAesOperation { crypter, mode, dir, input_len: 0 }))
    }

    fn begin_aead(
        &self,
        key: aes::Key,
        mode: aes::AeadMode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn crypto::AadOperation>, Error> {
        let dir_mode = match dir {
            SymmetricOperation::Encrypt => openssl::symm::Mode::Encrypt,
            SymmetricOperation::Decrypt => openssl::symm::Mode::Decrypt,
        };
        let (crypter, tag_len) = match &mode {
            aes::AeadMode::Gcm(gcm) => {
                let cipher = match &key {
                    aes::Key::Aes128(_) => Cipher::aes_128_gcm(),
                    aes::Key::Aes192(_) => Cipher::aes_192_gcm(),
                    aes::Key::Aes256(_) => Cipher::aes_256_gcm(),
                };
                let crypter = Crypter::new(cipher, dir_mode, key.bytes(), Some(&gcm.nonce()[..]))
                    .map_err(openssl_err!("failed to create GCM Crypter for {:?}", dir))?;
                (crypter, gcm.tag_len())
            }
            aes::AeadMode::Ocb { nonce } => {
                let cipher = match &key {
                    aes::Key::Aes128(_) => Cipher::aes_128_ocb(),
                    aes::Key::Aes256(_) => Cipher::aes_256_ocb(),
                    aes::Key::Aes192(_) => {
                        return Err(ks_err!(UnknownError, "no OCB support for AES-192 keys"))
                    }
                };
                let crypter = Crypter::new(cipher, dir_mode, key.bytes(), Some(&nonce[..]))
                    .map_err(openssl_err!("failed to create OCB Crypter for {:?}", dir))?;
                (crypter, sks_common::keyblob::legacy::TAG_SIZE)
            }
        };

        Ok(Box::new(BoringAesAeadOperation { crypter, dir, tag_len }))
    }
}

/// [`crypto::EmittingOperation`] implementation for AES cipher modes.
pub struct BoringAesOperation {
    crypter: Crypter,
    mode: aes::CipherMode,
    dir: SymmetricOperation,
    input_len: usize,
}

impl crypto::EmittingOperation for BoringAesOperation {
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.input_len += data.len();
        let mut output = vec![0; data.len() + aes::BLOCK_SIZE];
        let out_len = self
            .crypter
            .update(data, &mut output)
            .map_err(openssl_err!("update {} bytes from input failed", data.len()))?;
        output.truncate(out_len);
        Ok(output)
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, Error> {
        match self.mode {
            aes::CipherMode::EcbNoPadding | aes::CipherMode::CbcNoPadding { .. } => {
                if self.input_len % aes::BLOCK_SIZE != 0 {
                    return Err(ks_err!(
                        InvalidInputLength,
                        "total input len {} not a block multiple",
                        self.input_len
                    ));
                }
            }
            aes::CipherMode::EcbPkcs7Padding | aes::CipherMode::CbcPkcs7Padding { .. } => {
                if self.dir == SymmetricOperation::Decrypt
                    && self.input_len % aes::BLOCK_SIZE != 0
                {
                    return Err(ks_err!(
                        InvalidInputLength,
                        "padded ciphertext len {} not a block multiple",
                        self.input_len
                    ));
                }
            }
            aes::CipherMode::Ctr { .. } => {}
        }

        let mut output = vec![0; aes::BLOCK_SIZE];
        let out_len = match self.crypter.finalize(&mut output) {
            Ok(len) => len,
            Err(e) => {
                // The only post-length-check finalize failure for the padded
                // modes is malformed padding on decryption.
                return Err(match self.mode {
                    aes::CipherMode::EcbPkcs7Padding | aes::CipherMode::CbcPkcs7Padding { .. }
                        if self.dir == SymmetricOperation::Decrypt =>
                    {
                        ks_err!(InvalidArgument, "malformed PKCS7 padding: {:?}", e)
                    }
                    _ => ks_err!(UnknownError, "failed to finalize AES operation: {:?}", e),
                });
            }
        };
        output.truncate(out_len);
        Ok(output)
    }
}

/// [`crypto::AadOperation`] implementation for AES AEAD modes.
pub struct BoringAesAeadOperation {
    crypter: Crypter,
    dir: SymmetricOperation,
    tag_len: usize,
}

impl crypto::AadOperation for BoringAesAeadOperation {
    fn update_aad(&mut self, aad: &[u8]) -> Result<(), Error> {
        ossl!(self.crypter.aad_update(aad))
    }

    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut output = vec![0; data.len() + aes::BLOCK_SIZE];
        let out_len = self
            .crypter
            .update(data, &mut output)
            .map_err(openssl_err!("update {} bytes from input failed", data.len()))?;
        output.truncate(out_len);
        Ok(output)
    }

    fn finish(
        mut self: Box<Self>,
        tag: Option<&[u8]>,
    ) -> Result<(Vec<u8>, Option<Vec<u8>>), Error> {
        match self.dir {
            SymmetricOperation::Encrypt => {
                if tag.is_some() {
                    return Err(ks_err!(UnknownError, "tag provided for AEAD encryption"));
                }
                let mut output = vec![0; aes::BLOCK_SIZE];
                let offset = self
                    .crypter
                    .finalize(&mut output)
                    .map_err(openssl_err!("failed to finalize AEAD encryption"))?;
                output.truncate(offset);

                let mut tag = vec![0; self.tag_len];
                self.crypter
                    .get_tag(&mut tag)
                    .map_err(openssl_err!("failed to get tag of len {}", self.tag_len))?;
                Ok((output, Some(tag)))
            }
            SymmetricOperation::Decrypt => {
                let tag = tag
                    .ok_or_else(|| ks_err!(VerificationFailed, "no tag for AEAD decryption"))?;
                if tag.len() != self.tag_len {
                    return Err(ks_err!(
                        VerificationFailed,
                        "tag len {} != expected {}",
                        tag.len(),
                        self.tag_len
                    ));
                }
                self.crypter
                    .set_tag(tag)
                    .map_err(openssl_err!("failed to set {} bytes of tag", tag.len()))?;
                let mut output = vec![0; aes::BLOCK_SIZE];
                let out_len = self
                    .crypter
                    .finalize(&mut output)
                    .map_err(openssl_err_or!(VerificationFailed, "failed to finalize"))?;
                output.truncate(out_len);
                Ok((output, None))
            }
        }
    }
}
