//! Engine functionality related to key generation/import/export.

use crate::Keystore;
use sks_common::{
    authset::AuthorizationSet,
    crypto::{aes, ec, hmac, rsa, KeyMaterial},
    get_tag_value, keyblob, ks_err, tag,
    tag::KeyGenInfo,
    Error,
};
use sks_wire::{
    Algorithm, ErrorCode, KeyCharacteristics, KeyCreationResult, KeyFormat, KeyOrigin, KeyParam,
};

/// Rebuild typed key material from the raw bytes recovered out of a key
/// blob, using the algorithm (and curve) recorded in its authorizations.
pub(crate) fn key_material_from_blob(
    blob: &keyblob::PlaintextKeyBlob,
) -> Result<KeyMaterial, Error> {
    let auths = blob.combined_auths();
    let raw = blob.key_material.0.clone();
    match tag::get_algorithm(&auths)? {
        Algorithm::Rsa => Ok(KeyMaterial::Rsa(rsa::Key(raw))),
        Algorithm::Ec => {
            let curve = get_tag_value!(&*auths, EcCurve, ErrorCode::InvalidKeyBlob)?;
            Ok(KeyMaterial::Ec(curve, ec::Key::from_der(curve, raw)))
        }
        Algorithm::Aes => Ok(KeyMaterial::Aes(aes::Key::new(raw)?)),
        Algorithm::Hmac => Ok(KeyMaterial::Hmac(hmac::Key::new(raw))),
    }
}

impl Keystore {
    /// Generate a fresh key according to `params`, returning the sealed blob
    /// and the key's characteristics.
    pub fn generate_key(&self, params: &[KeyParam]) -> Result<KeyCreationResult, Error> {
        let (mut chars, keygen_info) = tag::extract_key_gen_characteristics(params)?;
        self.add_creation_tags(&mut chars, KeyOrigin::Generated);

        let key_material = {
            let mut rng = self.rng_lock()?;
            match keygen_info {
                KeyGenInfo::Aes(variant) => self.imp.aes.generate_key(&mut **rng, variant)?,
                KeyGenInfo::Hmac(key_size) => self.imp.hmac.generate_key(&mut **rng, key_size)?,
                KeyGenInfo::Rsa(key_size, pub_exponent) => {
                    self.imp.rsa.generate_key(&mut **rng, key_size, pub_exponent)?
                }
                KeyGenInfo::Ec(curve) => self.imp.ec.generate_key(&mut **rng, curve)?,
            }
        };

        self.finish_key_creation(chars, key_material)
    }

    /// Import key material supplied by the caller, returning the sealed blob
    /// and the key's characteristics.
    pub fn import_key(
        &self,
        params: &[KeyParam],
        key_format: KeyFormat,
        key_data: &[u8],
    ) -> Result<KeyCreationResult, Error> {
        let (mut chars, key_material) =
            tag::extract_key_import_characteristics(&self.imp, params, key_format, key_data)?;
        self.add_creation_tags(&mut chars, KeyOrigin::Imported);

        self.finish_key_creation(chars, key_material)
    }

    /// Export the public half of the key held in `key_blob` as an X.509
    /// `SubjectPublicKeyInfo`.  Symmetric keys cannot be exported.
    pub fn export_key(&self, key_format: KeyFormat, key_blob: &[u8]) -> Result<Vec<u8>, Error> {
        let (keyblob, class) = self.parse_key_blob(key_blob)?;
        if key_format != KeyFormat::X509 {
            return Err(ks_err!(
                UnsupportedKeyFormat,
                "unsupported export format {:?}, expect X509",
                key_format
            ));
        }
        let key_material = key_material_from_blob(&keyblob)?;
        let imp = if class == crate::BlobClass::Delegated {
            self.count_delegated_call();
            self.subordinate_imp()?
        } else {
            &self.imp
        };
        key_material.export_spki(&*imp.ec)
    }

    /// Return the two authorization partitions of the key held in
    /// `key_blob`.  For a delegated blob the hardware-enforced set carries
    /// the policy tags discovered from the legacy blob.
    pub fn get_key_characteristics(&self, key_blob: &[u8]) -> Result<KeyCharacteristics, Error> {
        let (keyblob, class) = self.parse_key_blob(key_blob)?;
        if class == crate::BlobClass::Delegated {
            self.count_delegated_call();
        }
        Ok(KeyCharacteristics {
            hw_enforced: keyblob.hw_enforced.0.clone(),
            sw_enforced: keyblob.sw_enforced.0.clone(),
        })
    }

    /// Append the engine-generated provenance tags.
    fn add_creation_tags(&self, chars: &mut Vec<KeyParam>, origin: KeyOrigin) {
        chars.push(KeyParam::Origin(origin));
        chars.push(KeyParam::CreationDatetime(self.clock.now()));
    }

    /// Seal fresh key material into a blob.  A pure-software engine enforces
    /// everything itself, so all characteristics land in the
    /// software-enforced partition.
    fn finish_key_creation(
        &self,
        chars: Vec<KeyParam>,
        key_material: KeyMaterial,
    ) -> Result<KeyCreationResult, Error> {
        let hw_enforced = AuthorizationSet::new();
        let sw_enforced = AuthorizationSet(chars);
        let raw = key_material.to_raw();
        let key_blob = {
            let mut rng = self.rng_lock()?;
            keyblob::seal(
                &*self.imp.aes,
                &mut **rng,
                &self.master_key,
                &hw_enforced,
                &sw_enforced,
                &raw,
            )?
        };
        Ok(KeyCreationResult {
            key_blob,
            characteristics: KeyCharacteristics {
                hw_enforced: hw_enforced.0,
                sw_enforced: sw_enforced.0,
            },
        })
    }
}
