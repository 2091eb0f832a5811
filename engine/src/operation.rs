//! Engine functionality related to in-progress crypto operations.

use crate::{keys, BlobClass, Keystore, MAX_OPERATIONS};
use sks_common::{
    crypto::{
        aes, rsa, AadOperation, AccumulatingOperation, EmittingOperation, KeyMaterial,
        SymmetricOperation, VerifyOperation,
    },
    ks_err, tag, Error,
};
use sks_wire::{
    BeginResult, FinishResult, KeyParam, KeyPurpose, OperationHandle, UpdateResult,
};
use std::sync::{Arc, Mutex};

/// Union holder for in-progress cryptographic operations, each of which is an
/// instance of the relevant trait.
pub(crate) enum CryptoOperation {
    Aes(Box<dyn EmittingOperation>),
    AesAead { op: Box<dyn AadOperation>, dir: SymmetricOperation },
    HmacSign(Box<dyn AccumulatingOperation>, usize), // tag length in bytes
    HmacVerify(Box<dyn AccumulatingOperation>, usize), // tag length in bytes
    RsaSign(Box<dyn AccumulatingOperation>),
    RsaVerify(Box<dyn VerifyOperation>),
    RsaEncrypt(Box<dyn AccumulatingOperation>),
    RsaDecrypt(Box<dyn AccumulatingOperation>),
    EcSign(Box<dyn AccumulatingOperation>),
    EcVerify(Box<dyn VerifyOperation>),
}

/// Current state of an operation.
pub(crate) struct Operation {
    /// Whether AAD may still arrive (only ever true for AEADs before any
    /// data byte has been consumed).
    aad_allowed: bool,

    /// AEAD authentication tag captured from operation parameters, for
    /// decryption.
    pending_tag: Option<Vec<u8>>,

    /// Whether primitive calls for this operation are delegated to the
    /// subordinate backend.
    delegated: bool,

    /// Accumulated input size.
    input_size: usize,

    crypto_op: CryptoOperation,
}

impl Operation {
    /// Check whether `len` additional bytes of data can be accommodated by
    /// the operation.
    fn check_size(&mut self, len: usize) -> Result<(), Error> {
        self.input_size += len;
        let max_size = match &self.crypto_op {
            CryptoOperation::HmacSign(op, _)
            | CryptoOperation::HmacVerify(op, _)
            | CryptoOperation::RsaSign(op)
            | CryptoOperation::RsaEncrypt(op)
            | CryptoOperation::RsaDecrypt(op)
            | CryptoOperation::EcSign(op) => op.max_input_size(),
            CryptoOperation::RsaVerify(op) | CryptoOperation::EcVerify(op) => op.max_input_size(),
            CryptoOperation::Aes(_) | CryptoOperation::AesAead { .. } => None,
        };
        if let Some(max_size) = max_size {
            if self.input_size > max_size {
                return Err(ks_err!(
                    InvalidInputLength,
                    "too much input accumulated for operation"
                ));
            }
        }
        Ok(())
    }

    /// Absorb per-call operation parameters: associated data (AEAD only,
    /// before any data bytes) and the expected AEAD tag.
    fn absorb_params(&mut self, params: &[KeyParam]) -> Result<(), Error> {
        for param in params {
            match param {
                KeyParam::AssociatedData(aad) => match &mut self.crypto_op {
                    CryptoOperation::AesAead { op, .. } => {
                        if !self.aad_allowed {
                            return Err(ks_err!(
                                InvalidTag,
                                "associated data after data bytes consumed"
                            ));
                        }
                        op.update_aad(aad)?;
                    }
                    // Non-AEAD operations ignore stray associated data.
                    _ => {}
                },
                KeyParam::AeadTag(tag) => self.pending_tag = Some(tag.clone()),
                _ => {}
            }
        }
        Ok(())
    }

    /// Absorb per-call parameters and then feed `input` into the primitive.
    fn advance(&mut self, input: &[u8], params: &[KeyParam]) -> Result<Vec<u8>, Error> {
        self.absorb_params(params)?;
        self.consume(input)
    }

    /// Feed data bytes into the underlying primitive.
    fn consume(&mut self, input: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_size(input.len())?;
        if input.is_empty() {
            return Ok(Vec::new());
        }
        self.aad_allowed = false;
        match &mut self.crypto_op {
            CryptoOperation::Aes(op) => op.update(input),
            CryptoOperation::AesAead { op, .. } => op.update(input),
            CryptoOperation::HmacSign(op, _)
            | CryptoOperation::HmacVerify(op, _)
            | CryptoOperation::RsaSign(op)
            | CryptoOperation::RsaEncrypt(op)
            | CryptoOperation::RsaDecrypt(op)
            | CryptoOperation::EcSign(op) => {
                op.update(input)?;
                Ok(Vec::new())
            }
            CryptoOperation::RsaVerify(op) | CryptoOperation::EcVerify(op) => {
                op.update(input)?;
                Ok(Vec::new())
            }
        }
    }
}

impl Keystore {
    /// Start an operation: unseal the key blob, check that the requested use
    /// is authorized, and set up the primitive.  Returns a fresh operation
    /// handle plus any engine-generated parameters (e.g. a random nonce).
    pub fn begin(
        &self,
        purpose: KeyPurpose,
        key_blob: &[u8],
        params: &[KeyParam],
    ) -> Result<BeginResult, Error> {
        let (keyblob, class) = self.parse_key_blob(key_blob)?;
        let chars = keyblob.combined_auths();
        tag::check_begin_params(&chars, purpose, params)?;
        let key_material = keys::key_material_from_blob(&keyblob)?;
        drop(keyblob);

        let delegated = class == BlobClass::Delegated;
        let imp = if delegated {
            self.count_delegated_call();
            self.subordinate_imp()?
        } else {
            &self.imp
        };

        let mut ret_params = Vec::new();
        let crypto_op = match key_material {
            KeyMaterial::Aes(key) => {
                let caller_nonce = aes::caller_nonce(params)?;
                let mode = {
                    let mut rng = self.rng_lock()?;
                    aes::Mode::new(params, caller_nonce, &mut **rng)?
                };
                let dir = match purpose {
                    KeyPurpose::Encrypt => SymmetricOperation::Encrypt,
                    KeyPurpose::Decrypt => SymmetricOperation::Decrypt,
                    _ => {
                        return Err(ks_err!(
                            IncompatiblePurpose,
                            "invalid purpose {:?} for AES key",
                            purpose
                        ))
                    }
                };
                if caller_nonce.is_none() {
                    // Return any engine-generated nonce to the caller.
                    if let Some(nonce) = mode.nonce() {
                        ret_params.push(KeyParam::Nonce(nonce.to_vec()));
                    }
                }
                match mode {
                    aes::Mode::Cipher(mode) => {
                        CryptoOperation::Aes(imp.aes.begin(key, mode, dir)?)
                    }
                    aes::Mode::Aead(gcm) => CryptoOperation::AesAead {
                        op: imp.aes.begin_aead(key, aes::AeadMode::Gcm(gcm), dir)?,
                        dir,
                    },
                }
            }
            KeyMaterial::Hmac(key) => {
                let digest = tag::get_digest(params)?;
                let tag_len = tag::hmac_mac_length(&chars, params, digest)? as usize / 8;
                match purpose {
                    KeyPurpose::Sign => {
                        CryptoOperation::HmacSign(imp.hmac.begin(key, digest)?, tag_len)
                    }
                    KeyPurpose::Verify => {
                        CryptoOperation::HmacVerify(imp.hmac.begin(key, digest)?, tag_len)
                    }
                    _ => {
                        return Err(ks_err!(
                            IncompatiblePurpose,
                            "invalid purpose {:?} for HMAC key",
                            purpose
                        ))
                    }
                }
            }
            KeyMaterial::Rsa(key) => match purpose {
                KeyPurpose::Sign => {
                    CryptoOperation::RsaSign(imp.rsa.begin_sign(key, rsa::SignMode::new(params)?)?)
                }
                KeyPurpose::Verify => CryptoOperation::RsaVerify(
                    imp.rsa.begin_verify(key, rsa::SignMode::new(params)?)?,
                ),
                KeyPurpose::Encrypt => CryptoOperation::RsaEncrypt(
                    imp.rsa.begin_encrypt(key, rsa::EncryptionMode::new(params)?)?,
                ),
                KeyPurpose::Decrypt => CryptoOperation::RsaDecrypt(
                    imp.rsa.begin_decrypt(key, rsa::EncryptionMode::new(params)?)?,
                ),
            },
            KeyMaterial::Ec(_curve, key) => {
                let digest = tag::get_digest(params)?;
                match purpose {
                    KeyPurpose::Sign => CryptoOperation::EcSign(imp.ec.begin_sign(key, digest)?),
                    KeyPurpose::Verify => {
                        CryptoOperation::EcVerify(imp.ec.begin_verify(key, digest)?)
                    }
                    _ => {
                        return Err(ks_err!(
                            IncompatiblePurpose,
                            "invalid purpose {:?} for EC key",
                            purpose
                        ))
                    }
                }
            }
        };

        let aad_allowed = matches!(crypto_op, CryptoOperation::AesAead { .. });
        let op = Operation {
            aad_allowed,
            pending_tag: None,
            delegated,
            input_size: 0,
            crypto_op,
        };

        // Register the operation under a fresh handle.  The handle is drawn
        // from the RNG and must be unique among live operations.
        let mut ops = self.ops_lock()?;
        if ops.len() >= MAX_OPERATIONS {
            return Err(ks_err!(
                TooManyOperations,
                "current op count {} >= limit {}",
                ops.len(),
                MAX_OPERATIONS
            ));
        }
        let handle = {
            let mut rng = self.rng_lock()?;
            loop {
                let handle = rng.next_u64();
                if handle != 0 && !ops.contains_key(&handle) {
                    break handle;
                }
                // Handle already in use, go around again.
            }
        };
        ops.insert(handle, Arc::new(Mutex::new(Some(op))));

        Ok(BeginResult { op_handle: OperationHandle(handle), params: ret_params })
    }

    /// Feed data into an operation.  All of the input is consumed; a partial
    /// trailing block may be buffered by the primitive until the next call.
    /// Any primitive-layer failure destroys the operation.
    pub fn update(
        &self,
        op_handle: OperationHandle,
        input: &[u8],
        params: &[KeyParam],
    ) -> Result<UpdateResult, Error> {
        let slot = self.get_op_slot(op_handle)?;
        let mut guard = slot
            .lock()
            .map_err(|_e| ks_err!(UnknownError, "operation lock poisoned"))?;
        let op = guard
            .as_mut()
            .ok_or_else(|| ks_err!(InvalidOperationHandle, "operation already completed"))?;
        if op.delegated {
            self.count_delegated_call();
        }

        let result = op
            .advance(input, params)
            .map(|output| UpdateResult { input_consumed: input.len(), output });
        if result.is_err() {
            // A failure destroys the operation.
            *guard = None;
            drop(guard);
            let _ = self.remove_op_slot(op_handle);
        }
        result
    }

    /// Complete an operation, releasing its handle regardless of the
    /// outcome.
    pub fn finish(
        &self,
        op_handle: OperationHandle,
        input: &[u8],
        signature: Option<&[u8]>,
        params: &[KeyParam],
    ) -> Result<FinishResult, Error> {
        let slot = self
            .remove_op_slot(op_handle)?
            .ok_or_else(|| ks_err!(InvalidOperationHandle, "operation {:?} not found", op_handle))?;
        let mut guard = slot
            .lock()
            .map_err(|_e| ks_err!(UnknownError, "operation lock poisoned"))?;
        let mut op = guard
            .take()
            .ok_or_else(|| ks_err!(InvalidOperationHandle, "operation already completed"))?;
        drop(guard);
        if op.delegated {
            self.count_delegated_call();
        }

        let mut output = op.advance(input, params)?;
        let mut ret_params = Vec::new();

        let Operation { crypto_op, pending_tag, .. } = op;
        match crypto_op {
            CryptoOperation::Aes(op) => {
                output.extend_from_slice(&op.finish()?);
            }
            CryptoOperation::AesAead { op, dir } => match dir {
                SymmetricOperation::Encrypt => {
                    let (trailer, tag) = op.finish(None)?;
                    output.extend_from_slice(&trailer);
                    let tag = tag
                        .ok_or_else(|| ks_err!(UnknownError, "AEAD encryption produced no tag"))?;
                    ret_params.push(KeyParam::AeadTag(tag));
                }
                SymmetricOperation::Decrypt => {
                    let tag = pending_tag.ok_or_else(|| {
                        ks_err!(InvalidArgument, "AEAD tag not provided for decryption")
                    })?;
                    let (trailer, _) = op.finish(Some(&tag))?;
                    output.extend_from_slice(&trailer);
                }
            },
            CryptoOperation::HmacSign(op, tag_len) => {
                let mut mac = op.finish()?;
                mac.truncate(tag_len);
                output = mac;
            }
            CryptoOperation::HmacVerify(op, tag_len) => {
                let signature = signature.ok_or_else(|| {
                    ks_err!(InvalidArgument, "signature missing for HMAC verify")
                })?;
                let mac = op.finish()?;
                if signature.len() != tag_len
                    || self.imp.compare.ne(&mac[..tag_len], signature)
                {
                    return Err(ks_err!(VerificationFailed, "HMAC verify failed"));
                }
            }
            CryptoOperation::RsaSign(op) | CryptoOperation::EcSign(op) => {
                output = op.finish()?;
            }
            CryptoOperation::RsaEncrypt(op) | CryptoOperation::RsaDecrypt(op) => {
                output = op.finish()?;
            }
            CryptoOperation::RsaVerify(op) | CryptoOperation::EcVerify(op) => {
                let signature = signature.ok_or_else(|| {
                    ks_err!(InvalidArgument, "signature missing for verification")
                })?;
                op.finish(signature)?;
            }
        }

        Ok(FinishResult { output, params: ret_params })
    }

    /// Release an operation without emitting output.
    pub fn abort(&self, op_handle: OperationHandle) -> Result<(), Error> {
        let slot = self
            .remove_op_slot(op_handle)?
            .ok_or_else(|| ks_err!(InvalidOperationHandle, "operation {:?} not found", op_handle))?;
        let mut guard = slot
            .lock()
            .map_err(|_e| ks_err!(UnknownError, "operation lock poisoned"))?;
        let _op = guard
            .take()
            .ok_or_else(|| ks_err!(InvalidOperationHandle, "operation already completed"))?;
        Ok(())
    }

    /// Return the slot for a live operation, without holding the table lock.
    fn get_op_slot(
        &self,
        op_handle: OperationHandle,
    ) -> Result<Arc<Mutex<Option<Operation>>>, Error> {
        self.ops_lock()?
            .get(&op_handle.0)
            .cloned()
            .ok_or_else(|| ks_err!(InvalidOperationHandle, "operation {:?} not found", op_handle))
    }

    /// Remove an operation's slot from the table, returning it if present.
    fn remove_op_slot(
        &self,
        op_handle: OperationHandle,
    ) -> Result<Option<Arc<Mutex<Option<Operation>>>>, Error> {
        Ok(self.ops_lock()?.remove(&op_handle.0))
    }
}
