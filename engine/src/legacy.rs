//! Classification and handling of legacy key blobs.
//!
//! Incoming blobs are dispatched on their leading sentinel byte before any
//! other parsing.  Blobs in the current format are handled directly.  Legacy
//! software blobs (sentinel `'P'`) are migrated in place: the OCB payload is
//! decrypted and the key then behaves like a native one, with no delegation.
//! For legacy hardware-mirror blobs (sentinel `'Q'`) the OCB unseal itself is
//! performed by the subordinate backend, and every subsequent primitive use
//! of the key is routed through it and counted.

use crate::Keystore;
use sks_common::{keyblob, keyblob::legacy, Error};

/// How a key blob is handled after classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobClass {
    /// Blob in the current sealed format.
    Native,
    /// Legacy software blob, migrated in place and handled natively.
    MigratedSoftware,
    /// Legacy hardware-mirror blob; primitive calls are delegated to the
    /// subordinate backend.
    Delegated,
}

impl Keystore {
    /// Classify and unseal a key blob.  Authorization policy is enforced by
    /// the engine for every class; only the primitive operations of a
    /// [`BlobClass::Delegated`] key go to the subordinate.
    pub(crate) fn parse_key_blob(
        &self,
        blob: &[u8],
    ) -> Result<(keyblob::PlaintextKeyBlob, BlobClass), Error> {
        match keyblob::blob_format(blob)? {
            keyblob::BlobFormat::Native => {
                let plaintext = keyblob::unseal(&*self.imp.aes, &self.master_key, blob)?;
                Ok((plaintext, BlobClass::Native))
            }
            keyblob::BlobFormat::LegacySoftware => {
                let encrypted = legacy::EncryptedKeyBlob::deserialize(blob)?;
                let plaintext = encrypted.decrypt(&*self.imp.aes, &self.master_key)?;
                Ok((plaintext, BlobClass::MigratedSoftware))
            }
            keyblob::BlobFormat::LegacyHardware => {
                // The software deployment mirrors the hardware master key, so
                // the unseal happens locally; the subordinate performs the
                // actual key operations.
                let sub = self.subordinate_imp()?;
                let encrypted = legacy::EncryptedKeyBlob::deserialize(blob)?;
                let plaintext = encrypted.decrypt(&*sub.aes, &self.master_key)?;
                Ok((plaintext, BlobClass::Delegated))
            }
        }
    }
}
