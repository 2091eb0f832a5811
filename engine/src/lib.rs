//! Software keystore engine implementation.
//!
//! The engine mediates key lifecycle and use on behalf of client
//! applications: keys are generated, imported and exported here, and every
//! cryptographic use runs through the begin/update/finish/abort operation
//! state machine.  Key material only ever leaves the engine sealed inside an
//! authenticated blob.

extern crate alloc;

use sks_common::{
    crypto,
    crypto::{aes, Clock, Rng},
    ks_err, Error,
};
use sks_wire::{
    Algorithm, BlockMode, DateTime, Digest, ErrorCode, KeyFormat, KeyPurpose, PaddingMode, Request,
    Response, RspBody,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

mod keys;
mod legacy;
mod operation;

pub use legacy::BlobClass;
use operation::Operation;

/// Maximum number of operations that may be in flight at once.
pub const MAX_OPERATIONS: usize = 32;

/// A subordinate backend that performs the primitive operations for legacy
/// hardware-mirror key blobs, together with a count of delegated calls.
struct Subordinate {
    imp: crypto::Implementation,
    delegated_calls: AtomicU64,
}

/// The keystore engine.  The command surface is thread-safe: per-handle
/// calls are serialized, cross-handle calls proceed in parallel.
pub struct Keystore {
    /// Trait objects holding the implementations of the abstract
    /// cryptographic functionality.
    imp: crypto::Implementation,

    /// Shared random source.
    rng: Mutex<Box<dyn Rng>>,

    /// Wall clock used to timestamp key creation.
    clock: Box<dyn Clock>,

    /// Master key sealing all emitted key blobs.  Generated at construction
    /// and immutable thereafter.
    master_key: aes::Key,

    /// The operation table.  Lookup clones the per-operation slot so the
    /// table lock is never held across a primitive call.
    operations: Mutex<BTreeMap<u64, Arc<Mutex<Option<Operation>>>>>,

    /// Subordinate backend for legacy hardware-mirror blobs, if configured.
    subordinate: Option<Subordinate>,
}

impl Keystore {
    /// Create a new engine with a fresh master key drawn from `rng`.  Blobs
    /// sealed by the engine do not survive beyond the lifetime of the master
    /// key.
    pub fn new(
        imp: crypto::Implementation,
        mut rng: Box<dyn Rng>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut master_key = [0u8; 32];
        rng.fill_bytes(&mut master_key);
        Self {
            imp,
            rng: Mutex::new(rng),
            clock,
            master_key: aes::Key::Aes256(master_key),
            operations: Mutex::new(BTreeMap::new()),
            subordinate: None,
        }
    }

    /// Use an externally-provisioned master key instead of a freshly
    /// generated one.  Deployments that persist the master key can make
    /// sealed blobs outlive the process this way.
    pub fn with_master_key(mut self, master_key: aes::Key) -> Self {
        self.master_key = master_key;
        self
    }

    /// Additionally delegate primitive calls for legacy hardware-mirror key
    /// blobs to `subordinate`.
    pub fn with_subordinate(mut self, subordinate: crypto::Implementation) -> Self {
        self.subordinate =
            Some(Subordinate { imp: subordinate, delegated_calls: AtomicU64::new(0) });
        self
    }

    /// Number of calls that have been delegated to the subordinate backend.
    pub fn delegated_call_count(&self) -> u64 {
        self.subordinate.as_ref().map_or(0, |sub| sub.delegated_calls.load(Ordering::Relaxed))
    }

    pub(crate) fn count_delegated_call(&self) {
        if let Some(sub) = &self.subordinate {
            sub.delegated_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn subordinate_imp(&self) -> Result<&crypto::Implementation, Error> {
        self.subordinate
            .as_ref()
            .map(|sub| &sub.imp)
            .ok_or_else(|| ks_err!(InvalidKeyBlob, "no subordinate backend configured"))
    }

    pub(crate) fn rng_lock(&self) -> Result<MutexGuard<'_, Box<dyn Rng>>, Error> {
        self.rng.lock().map_err(|_e| ks_err!(UnknownError, "RNG lock poisoned"))
    }

    pub(crate) fn ops_lock(
        &self,
    ) -> Result<MutexGuard<'_, BTreeMap<u64, Arc<Mutex<Option<Operation>>>>>, Error> {
        self.operations.lock().map_err(|_e| ks_err!(UnknownError, "operation table lock poisoned"))
    }

    /// Indicate whether a (algorithm, purpose) pairing makes sense at all.
    fn valid_purpose(algorithm: Algorithm, purpose: KeyPurpose) -> bool {
        matches!(
            (algorithm, purpose),
            (Algorithm::Rsa, _)
                | (Algorithm::Ec, KeyPurpose::Sign)
                | (Algorithm::Ec, KeyPurpose::Verify)
                | (Algorithm::Aes, KeyPurpose::Encrypt)
                | (Algorithm::Aes, KeyPurpose::Decrypt)
                | (Algorithm::Hmac, KeyPurpose::Sign)
                | (Algorithm::Hmac, KeyPurpose::Verify)
        )
    }

    /// Algorithms supported by this build.
    pub fn get_supported_algorithms(&self) -> Vec<Algorithm> {
        vec![Algorithm::Rsa, Algorithm::Ec, Algorithm::Aes, Algorithm::Hmac]
    }

    /// Block modes supported for the given algorithm and purpose.
    pub fn get_supported_block_modes(
        &self,
        algorithm: Algorithm,
        purpose: KeyPurpose,
    ) -> Result<Vec<BlockMode>, Error> {
        if !Self::valid_purpose(algorithm, purpose) {
            return Err(ks_err!(
                UnsupportedPurpose,
                "purpose {:?} invalid for {:?}",
                purpose,
                algorithm
            ));
        }
        Ok(match algorithm {
            Algorithm::Aes => {
                vec![BlockMode::Ecb, BlockMode::Cbc, BlockMode::Ctr, BlockMode::Gcm]
            }
            _ => vec![],
        })
    }

    /// Padding modes supported for the given algorithm and purpose.
    pub fn get_supported_padding_modes(
        &self,
        algorithm: Algorithm,
        purpose: KeyPurpose,
    ) -> Result<Vec<PaddingMode>, Error> {
        if !Self::valid_purpose(algorithm, purpose) {
            return Err(ks_err!(
                UnsupportedPurpose,
                "purpose {:?} invalid for {:?}",
                purpose,
                algorithm
            ));
        }
        Ok(match (algorithm, purpose) {
            (Algorithm::Rsa, KeyPurpose::Sign) | (Algorithm::Rsa, KeyPurpose::Verify) => {
                vec![PaddingMode::None, PaddingMode::RsaPkcs115Sign, PaddingMode::RsaPss]
            }
            (Algorithm::Rsa, KeyPurpose::Encrypt) | (Algorithm::Rsa, KeyPurpose::Decrypt) => {
                vec![PaddingMode::None, PaddingMode::RsaOaep, PaddingMode::RsaPkcs115Encrypt]
            }
            (Algorithm::Aes, _) => vec![PaddingMode::None, PaddingMode::Pkcs7],
            _ => vec![],
        })
    }

    /// Digests supported for the given algorithm and purpose.
    pub fn get_supported_digests(
        &self,
        algorithm: Algorithm,
        purpose: KeyPurpose,
    ) -> Result<Vec<Digest>, Error> {
        if !Self::valid_purpose(algorithm, purpose) {
            return Err(ks_err!(
                UnsupportedPurpose,
                "purpose {:?} invalid for {:?}",
                purpose,
                algorithm
            ));
        }
        Ok(match algorithm {
            Algorithm::Rsa | Algorithm::Ec => vec![
                Digest::None,
                Digest::Md5,
                Digest::Sha1,
                Digest::Sha224,
                Digest::Sha256,
                Digest::Sha384,
                Digest::Sha512,
            ],
            Algorithm::Hmac => vec![
                Digest::Sha1,
                Digest::Sha224,
                Digest::Sha256,
                Digest::Sha384,
                Digest::Sha512,
            ],
            Algorithm::Aes => vec![],
        })
    }

    /// Import formats supported for the given algorithm.
    pub fn get_supported_import_formats(&self, algorithm: Algorithm) -> Vec<KeyFormat> {
        match algorithm {
            Algorithm::Rsa | Algorithm::Ec => vec![KeyFormat::Pkcs8],
            Algorithm::Aes | Algorithm::Hmac => vec![KeyFormat::Raw],
        }
    }

    /// Export formats supported for the given algorithm.
    pub fn get_supported_export_formats(&self, algorithm: Algorithm) -> Vec<KeyFormat> {
        match algorithm {
            Algorithm::Rsa | Algorithm::Ec => vec![KeyFormat::X509],
            Algorithm::Aes | Algorithm::Hmac => vec![],
        }
    }

    /// Process a single command, returning a response carrying a single
    /// error code.
    ///
    /// Select the appropriate method based on the request type, and use the
    /// request fields as parameters to the method.  In the opposite
    /// direction, build a response message from the values returned by the
    /// method.
    pub fn process(&self, req: Request) -> Response {
        match req {
            Request::GenerateKey(req) => match self.generate_key(&req.key_params) {
                Ok(ret) => ok_rsp(RspBody::GenerateKey(sks_wire::GenerateKeyResponse { ret })),
                Err(e) => error_rsp("GenerateKey", e),
            },
            Request::ImportKey(req) => {
                match self.import_key(&req.key_params, req.key_format, &req.key_data) {
                    Ok(ret) => ok_rsp(RspBody::ImportKey(sks_wire::ImportKeyResponse { ret })),
                    Err(e) => error_rsp("ImportKey", e),
                }
            }
            Request::ExportKey(req) => match self.export_key(req.key_format, &req.key_blob) {
                Ok(ret) => ok_rsp(RspBody::ExportKey(sks_wire::ExportKeyResponse { ret })),
                Err(e) => error_rsp("ExportKey", e),
            },
            Request::GetKeyCharacteristics(req) => {
                match self.get_key_characteristics(&req.key_blob) {
                    Ok(ret) => ok_rsp(RspBody::GetKeyCharacteristics(
                        sks_wire::GetKeyCharacteristicsResponse { ret },
                    )),
                    Err(e) => error_rsp("GetKeyCharacteristics", e),
                }
            }
            Request::Begin(req) => match self.begin(req.purpose, &req.key_blob, &req.params) {
                Ok(ret) => ok_rsp(RspBody::Begin(sks_wire::BeginResponse { ret })),
                Err(e) => error_rsp("Begin", e),
            },
            Request::Update(req) => match self.update(req.op_handle, &req.input, &req.params) {
                Ok(ret) => ok_rsp(RspBody::Update(sks_wire::UpdateResponse { ret })),
                Err(e) => error_rsp("Update", e),
            },
            Request::Finish(req) => {
                match self.finish(req.op_handle, &req.input, req.signature.as_deref(), &req.params)
                {
                    Ok(ret) => ok_rsp(RspBody::Finish(sks_wire::FinishResponse { ret })),
                    Err(e) => error_rsp("Finish", e),
                }
            }
            Request::Abort(req) => match self.abort(req.op_handle) {
                Ok(()) => ok_rsp(RspBody::Abort(sks_wire::AbortResponse {})),
                Err(e) => error_rsp("Abort", e),
            },
            Request::GetSupportedAlgorithms(_req) => {
                ok_rsp(RspBody::GetSupportedAlgorithms(sks_wire::GetSupportedAlgorithmsResponse {
                    ret: self.get_supported_algorithms(),
                }))
            }
            Request::GetSupportedBlockModes(req) => {
                match self.get_supported_block_modes(req.algorithm, req.purpose) {
                    Ok(ret) => ok_rsp(RspBody::GetSupportedBlockModes(
                        sks_wire::GetSupportedBlockModesResponse { ret },
                    )),
                    Err(e) => error_rsp("GetSupportedBlockModes", e),
                }
            }
            Request::GetSupportedPaddingModes(req) => {
                match self.get_supported_padding_modes(req.algorithm, req.purpose) {
                    Ok(ret) => ok_rsp(RspBody::GetSupportedPaddingModes(
                        sks_wire::GetSupportedPaddingModesResponse { ret },
                    )),
                    Err(e) => error_rsp("GetSupportedPaddingModes", e),
                }
            }
            Request::GetSupportedDigests(req) => {
                match self.get_supported_digests(req.algorithm, req.purpose) {
                    Ok(ret) => ok_rsp(RspBody::GetSupportedDigests(
                        sks_wire::GetSupportedDigestsResponse { ret },
                    )),
                    Err(e) => error_rsp("GetSupportedDigests", e),
                }
            }
            Request::GetSupportedImportFormats(req) => {
                ok_rsp(RspBody::GetSupportedImportFormats(
                    sks_wire::GetSupportedImportFormatsResponse {
                        ret: self.get_supported_import_formats(req.algorithm),
                    },
                ))
            }
            Request::GetSupportedExportFormats(req) => {
                ok_rsp(RspBody::GetSupportedExportFormats(
                    sks_wire::GetSupportedExportFormatsResponse {
                        ret: self.get_supported_export_formats(req.algorithm),
                    },
                ))
            }
        }
    }
}

/// Create a response structure for a successful command.
fn ok_rsp(rsp: RspBody) -> Response {
    Response { error_code: ErrorCode::Ok, rsp: Some(rsp) }
}

/// Create a response structure with the given error.
fn error_rsp(op: &str, err: Error) -> Response {
    log::error!("failing {} request with error {:?}", op, err);
    Response { error_code: err.into(), rsp: None }
}

/// [`Clock`] implementation based on the system real-time clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        let ms_since_epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as i64);
        DateTime { ms_since_epoch }
    }
}
