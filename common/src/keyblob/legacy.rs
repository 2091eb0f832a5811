//! Utilities for handling legacy key blobs.
//!
//! These blobs hold OCB-encrypted key material in an older enclosing format.
//! The OCB primitive is kept only for reading them; new blobs are always
//! emitted in the current sealed format.

use super::PlaintextKeyBlob;
use crate::{
    authset::{consume_u8, consume_vec, AuthorizationSet},
    crypto::{self, aes, RawKeyMaterial, SymmetricOperation},
    ks_err, Error,
};
use alloc::vec::Vec;

/// Sentinel byte for a legacy software key blob.
pub const SOFTWARE_SENTINEL: u8 = b'P';

/// Sentinel byte for a legacy key blob mirroring hardware-held material.
pub const HARDWARE_SENTINEL: u8 = b'Q';

/// Size of the OCB nonce.
pub const NONCE_SIZE: usize = aes::OCB_NONCE_SIZE;

/// Size of the OCB authentication tag.
pub const TAG_SIZE: usize = 16;

/// Encrypted legacy key blob:
///
/// ```text
/// sentinel(1) || nonce(12) || ciphertext(u32 len + data) || tag(16)
///             || hw_enforced || sw_enforced
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct EncryptedKeyBlob {
    pub sentinel: u8,
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
    pub hw_enforced: AuthorizationSet,
    pub sw_enforced: AuthorizationSet,
}

impl EncryptedKeyBlob {
    /// Serialize an [`EncryptedKeyBlob`].
    pub fn serialize(&self) -> Vec<u8> {
        let mut result = alloc::vec![self.sentinel];
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&(self.ciphertext.len() as u32).to_le_bytes());
        result.extend_from_slice(&self.ciphertext);
        result.extend_from_slice(&self.tag);
        result.extend_from_slice(&self.hw_enforced.serialize());
        result.extend_from_slice(&self.sw_enforced.serialize());
        result
    }

    /// Parse a serialized [`EncryptedKeyBlob`], mapping any failure to
    /// `InvalidKeyBlob`.
    pub fn deserialize(blob: &[u8]) -> Result<Self, Error> {
        Self::deserialize_inner(blob)
            .map_err(|e| ks_err!(InvalidKeyBlob, "failed to parse legacy keyblob: {:?}", e))
    }

    fn deserialize_inner(blob: &[u8]) -> Result<Self, Error> {
        let mut data = blob;
        let sentinel = consume_u8(&mut data)?;
        if sentinel != SOFTWARE_SENTINEL && sentinel != HARDWARE_SENTINEL {
            return Err(ks_err!(InvalidKeyBlob, "unexpected legacy sentinel {:#04x}", sentinel));
        }
        if data.len() < NONCE_SIZE {
            return Err(ks_err!(InvalidInputLength, "failed to find {} nonce bytes", NONCE_SIZE));
        }
        let nonce: [u8; NONCE_SIZE] = data[..NONCE_SIZE].try_into().unwrap(); // safe: len checked
        data = &data[NONCE_SIZE..];

        let ciphertext = consume_vec(&mut data)?;

        if data.len() < TAG_SIZE {
            return Err(ks_err!(InvalidInputLength, "failed to find {} tag bytes", TAG_SIZE));
        }
        let tag: [u8; TAG_SIZE] = data[..TAG_SIZE].try_into().unwrap(); // safe: len checked
        data = &data[TAG_SIZE..];

        let hw_enforced = AuthorizationSet::deserialize(&mut data)?;
        let sw_enforced = AuthorizationSet::deserialize(&mut data)?;
        if !data.is_empty() {
            return Err(ks_err!(InvalidKeyBlob, "extra data (len {})", data.len()));
        }

        Ok(EncryptedKeyBlob { sentinel, nonce, ciphertext, tag, hw_enforced, sw_enforced })
    }

    /// Decrypt the OCB-encrypted key material, consuming the blob.  The
    /// additional authenticated data is the serialized authorization sets, as
    /// for the current format.
    pub fn decrypt(
        self,
        aes_impl: &dyn crypto::Aes,
        master_key: &aes::Key,
    ) -> Result<PlaintextKeyBlob, Error> {
        let mut op = aes_impl
            .begin_aead(
                master_key.clone(),
                aes::AeadMode::Ocb { nonce: self.nonce },
                SymmetricOperation::Decrypt,
            )
            .map_err(|e| ks_err!(InvalidKeyBlob, "failed to start OCB decrypt: {:?}", e))?;
        op.update_aad(&self.hw_enforced.serialize())
            .and_then(|_| op.update_aad(&self.sw_enforced.serialize()))
            .map_err(|e| ks_err!(InvalidKeyBlob, "failed to absorb legacy AAD: {:?}", e))?;
        let mut plaintext = op
            .update(&self.ciphertext)
            .map_err(|e| ks_err!(InvalidKeyBlob, "failed to decrypt legacy keyblob: {:?}", e))?;
        let (trailer, _) = op
            .finish(Some(&self.tag))
            .map_err(|e| ks_err!(InvalidKeyBlob, "legacy keyblob did not authenticate: {:?}", e))?;
        plaintext.extend_from_slice(&trailer);

        Ok(PlaintextKeyBlob {
            hw_enforced: self.hw_enforced,
            sw_enforced: self.sw_enforced,
            key_material: RawKeyMaterial(plaintext),
        })
    }
}

/// Encrypt key material into a legacy blob.  Only used to fabricate legacy
/// blobs in tests; production sealing always uses the current format.
pub fn encrypt(
    aes_impl: &dyn crypto::Aes,
    rng: &mut dyn crypto::Rng,
    master_key: &aes::Key,
    sentinel: u8,
    hw_enforced: AuthorizationSet,
    sw_enforced: AuthorizationSet,
    key_material: &[u8],
) -> Result<EncryptedKeyBlob, Error> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let mut op = aes_impl.begin_aead(
        master_key.clone(),
        aes::AeadMode::Ocb { nonce },
        SymmetricOperation::Encrypt,
    )?;
    op.update_aad(&hw_enforced.serialize())?;
    op.update_aad(&sw_enforced.serialize())?;
    let mut ciphertext = op.update(key_material)?;
    let (trailer, tag) = op.finish(None)?;
    ciphertext.extend_from_slice(&trailer);
    let tag = tag.ok_or_else(|| ks_err!(UnknownError, "OCB encryption produced no tag"))?;
    let tag: [u8; TAG_SIZE] = tag
        .try_into()
        .map_err(|_e| ks_err!(UnknownError, "OCB tag of unexpected size"))?;

    Ok(EncryptedKeyBlob { sentinel, nonce, ciphertext, tag, hw_enforced, sw_enforced })
}
