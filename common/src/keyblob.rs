//! Key blob manipulation functionality.

use crate::{
    authset::{consume_vec, AuthorizationSet},
    crypto::{self, aes, RawKeyMaterial, SymmetricOperation},
    ks_err, Error,
};
use alloc::vec::Vec;

pub mod legacy;

#[cfg(test)]
mod tests;

/// Leading byte identifying a key blob in the current sealed format.
pub const VERSION_SENTINEL: u8 = 0x00;

/// Size of the nonce used for key blob encryption.
pub const NONCE_SIZE: usize = aes::GCM_NONCE_SIZE;

/// Size of the authentication tag appended to key blob ciphertext.
pub const TAG_SIZE: usize = 16;

/// The enclosing format of a key blob, determined by its leading sentinel
/// byte before any other parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobFormat {
    /// Current sealed format.
    Native,
    /// Legacy OCB-encrypted software blob (sentinel `'P'`).
    LegacySoftware,
    /// Legacy OCB-encrypted blob mirroring hardware-held key material
    /// (sentinel `'Q'`); primitive operations are delegated.
    LegacyHardware,
}

/// Classify a key blob by its leading sentinel byte.
pub fn blob_format(blob: &[u8]) -> Result<BlobFormat, Error> {
    match blob.first() {
        Some(&VERSION_SENTINEL) => Ok(BlobFormat::Native),
        Some(&legacy::SOFTWARE_SENTINEL) => Ok(BlobFormat::LegacySoftware),
        Some(&legacy::HARDWARE_SENTINEL) => Ok(BlobFormat::LegacyHardware),
        Some(b) => Err(ks_err!(InvalidKeyBlob, "unknown key blob sentinel {:#04x}", b)),
        None => Err(ks_err!(InvalidKeyBlob, "empty key blob")),
    }
}

/// Plaintext key blob: both authorization partitions plus the raw key
/// material.  Callers must not cache the material beyond the current
/// operation; it is zeroed on drop.
#[derive(Debug, PartialEq, Eq)]
pub struct PlaintextKeyBlob {
    pub hw_enforced: AuthorizationSet,
    pub sw_enforced: AuthorizationSet,
    pub key_material: RawKeyMaterial,
}

impl PlaintextKeyBlob {
    /// Return the combined view of both authorization partitions, used for
    /// policy checks.
    pub fn combined_auths(&self) -> AuthorizationSet {
        let mut combined = self.hw_enforced.clone();
        combined.union_with(&self.sw_enforced);
        combined
    }
}

/// Seal a key blob:
///
/// ```text
/// version(1) || hw_enforced || sw_enforced || nonce || ciphertext || tag
/// ```
///
/// where `nonce`, `ciphertext` and `tag` carry a little-endian `u32` length
/// prefix, and `ciphertext || tag` is the AES-GCM encryption of the raw key
/// material under `master_key` with the serialized authorization sets as the
/// additional authenticated data.  Any mutation of the result is detected on
/// unseal.
pub fn seal(
    aes_impl: &dyn crypto::Aes,
    rng: &mut dyn crypto::Rng,
    master_key: &aes::Key,
    hw_enforced: &AuthorizationSet,
    sw_enforced: &AuthorizationSet,
    key_material: &RawKeyMaterial,
) -> Result<Vec<u8>, Error> {
    let hw_data = hw_enforced.serialize();
    let sw_data = sw_enforced.serialize();

    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let mut op = aes_impl.begin_aead(
        master_key.clone(),
        aes::AeadMode::Gcm(aes::GcmMode::GcmTag16 { nonce }),
        SymmetricOperation::Encrypt,
    )?;
    op.update_aad(&hw_data)?;
    op.update_aad(&sw_data)?;
    let mut ciphertext = op.update(&key_material.0)?;
    let (trailer, tag) = op.finish(None)?;
    ciphertext.extend_from_slice(&trailer);
    let tag = tag.ok_or_else(|| ks_err!(UnknownError, "AEAD encryption produced no tag"))?;

    let mut result = alloc::vec![VERSION_SENTINEL];
    result.extend_from_slice(&hw_data);
    result.extend_from_slice(&sw_data);
    result.extend_from_slice(&(nonce.len() as u32).to_le_bytes());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
    result.extend_from_slice(&ciphertext);
    result.extend_from_slice(&(tag.len() as u32).to_le_bytes());
    result.extend_from_slice(&tag);
    Ok(result)
}

/// Unseal a key blob in the current format, recovering the authorization
/// partitions and raw key material.  Fails with `InvalidKeyBlob` on any parse
/// or authentication error.
pub fn unseal(
    aes_impl: &dyn crypto::Aes,
    master_key: &aes::Key,
    blob: &[u8],
) -> Result<PlaintextKeyBlob, Error> {
    unseal_inner(aes_impl, master_key, blob)
        .map_err(|e| ks_err!(InvalidKeyBlob, "failed to unseal keyblob: {:?}", e))
}

fn unseal_inner(
    aes_impl: &dyn crypto::Aes,
    master_key: &aes::Key,
    blob: &[u8],
) -> Result<PlaintextKeyBlob, Error> {
    let mut data = blob;
    let version = crate::authset::consume_u8(&mut data)?;
    if version != VERSION_SENTINEL {
        return Err(ks_err!(InvalidKeyBlob, "unexpected blob version {}", version));
    }

    // Track the exact serialized extent of each auth set; those bytes are the
    // additional authenticated data.
    let before_hw = data;
    let hw_enforced = AuthorizationSet::deserialize(&mut data)?;
    let hw_data = &before_hw[..before_hw.len() - data.len()];
    let before_sw = data;
    let sw_enforced = AuthorizationSet::deserialize(&mut data)?;
    let sw_data = &before_sw[..before_sw.len() - data.len()];

    let nonce = consume_vec(&mut data)?;
    let ciphertext = consume_vec(&mut data)?;
    let tag = consume_vec(&mut data)?;
    if !data.is_empty() {
        return Err(ks_err!(InvalidKeyBlob, "extra data (len {})", data.len()));
    }
    if nonce.len() != NONCE_SIZE {
        return Err(ks_err!(InvalidKeyBlob, "unexpected nonce len {}", nonce.len()));
    }
    if tag.len() != TAG_SIZE {
        return Err(ks_err!(InvalidKeyBlob, "unexpected tag len {}", tag.len()));
    }
    let nonce: [u8; NONCE_SIZE] = nonce.try_into().unwrap(); // safe: len checked

    let mut op = aes_impl.begin_aead(
        master_key.clone(),
        aes::AeadMode::Gcm(aes::GcmMode::GcmTag16 { nonce }),
        SymmetricOperation::Decrypt,
    )?;
    op.update_aad(hw_data)?;
    op.update_aad(sw_data)?;
    let mut plaintext = op.update(&ciphertext)?;
    let (trailer, _) = op.finish(Some(&tag))?;
    plaintext.extend_from_slice(&trailer);

    Ok(PlaintextKeyBlob { hw_enforced, sw_enforced, key_material: RawKeyMaterial(plaintext) })
}
