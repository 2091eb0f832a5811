//! Request and response structures for the engine command surface.
//!
//! Each command's arguments are encapsulated in a corresponding `..Request`
//! struct, and its return value and out parameters in a `..Response` struct.
//! A [`Response`] always carries a single [`ErrorCode`]; `Ok` means success
//! and the body is present.

use crate::types::{
    Algorithm, BlockMode, Digest, ErrorCode, KeyFormat, KeyParam, KeyPurpose, PaddingMode,
};
use crate::OperationHandle;
use alloc::vec::Vec;

/// The two partitions of a key's authorizations.  The hardware-enforced set
/// is empty for keys created by a pure-software engine; it is populated for
/// keys delegated to a subordinate backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyCharacteristics {
    pub hw_enforced: Vec<KeyParam>,
    pub sw_enforced: Vec<KeyParam>,
}

/// Result of key generation or import.
#[derive(Clone, Debug)]
pub struct KeyCreationResult {
    /// Sealed key blob, opaque to the caller.
    pub key_blob: Vec<u8>,
    pub characteristics: KeyCharacteristics,
}

/// Result of starting an operation.
#[derive(Clone, Debug)]
pub struct BeginResult {
    pub op_handle: OperationHandle,
    /// Parameters generated by the engine, e.g. a random nonce.
    pub params: Vec<KeyParam>,
}

/// Result of feeding data into an operation.
#[derive(Clone, Debug)]
pub struct UpdateResult {
    pub input_consumed: usize,
    pub output: Vec<u8>,
}

/// Result of completing an operation.
#[derive(Clone, Debug)]
pub struct FinishResult {
    pub output: Vec<u8>,
    /// Parameters generated by the engine, e.g. the AEAD authentication tag.
    pub params: Vec<KeyParam>,
}

#[derive(Clone, Debug)]
pub struct GenerateKeyRequest {
    pub key_params: Vec<KeyParam>,
}
#[derive(Clone, Debug)]
pub struct GenerateKeyResponse {
    pub ret: KeyCreationResult,
}

#[derive(Clone, Debug)]
pub struct ImportKeyRequest {
    pub key_params: Vec<KeyParam>,
    pub key_format: KeyFormat,
    pub key_data: Vec<u8>,
}
#[derive(Clone, Debug)]
pub struct ImportKeyResponse {
    pub ret: KeyCreationResult,
}

#[derive(Clone, Debug)]
pub struct ExportKeyRequest {
    pub key_format: KeyFormat,
    pub key_blob: Vec<u8>,
}
#[derive(Clone, Debug)]
pub struct ExportKeyResponse {
    pub ret: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct GetKeyCharacteristicsRequest {
    pub key_blob: Vec<u8>,
}
#[derive(Clone, Debug)]
pub struct GetKeyCharacteristicsResponse {
    pub ret: KeyCharacteristics,
}

#[derive(Clone, Debug)]
pub struct BeginRequest {
    pub purpose: KeyPurpose,
    pub key_blob: Vec<u8>,
    pub params: Vec<KeyParam>,
}
#[derive(Clone, Debug)]
pub struct BeginResponse {
    pub ret: BeginResult,
}

#[derive(Clone, Debug)]
pub struct UpdateRequest {
    pub op_handle: OperationHandle,
    pub input: Vec<u8>,
    pub params: Vec<KeyParam>,
}
#[derive(Clone, Debug)]
pub struct UpdateResponse {
    pub ret: UpdateResult,
}

#[derive(Clone, Debug)]
pub struct FinishRequest {
    pub op_handle: OperationHandle,
    pub input: Vec<u8>,
    pub signature: Option<Vec<u8>>,
    pub params: Vec<KeyParam>,
}
#[derive(Clone, Debug)]
pub struct FinishResponse {
    pub ret: FinishResult,
}

#[derive(Clone, Debug)]
pub struct AbortRequest {
    pub op_handle: OperationHandle,
}
#[derive(Clone, Debug)]
pub struct AbortResponse {}

#[derive(Clone, Debug)]
pub struct GetSupportedAlgorithmsRequest {}
#[derive(Clone, Debug)]
pub struct GetSupportedAlgorithmsResponse {
    pub ret: Vec<Algorithm>,
}

#[derive(Clone, Debug)]
pub struct GetSupportedBlockModesRequest {
    pub algorithm: Algorithm,
    pub purpose: KeyPurpose,
}
#[derive(Clone, Debug)]
pub struct GetSupportedBlockModesResponse {
    pub ret: Vec<BlockMode>,
}

#[derive(Clone, Debug)]
pub struct GetSupportedPaddingModesRequest {
    pub algorithm: Algorithm,
    pub purpose: KeyPurpose,
}
#[derive(Clone, Debug)]
pub struct GetSupportedPaddingModesResponse {
    pub ret: Vec<PaddingMode>,
}

#[derive(Clone, Debug)]
pub struct GetSupportedDigestsRequest {
    pub algorithm: Algorithm,
    pub purpose: KeyPurpose,
}
#[derive(Clone, Debug)]
pub struct GetSupportedDigestsResponse {
    pub ret: Vec<Digest>,
}

#[derive(Clone, Debug)]
pub struct GetSupportedImportFormatsRequest {
    pub algorithm: Algorithm,
}
#[derive(Clone, Debug)]
pub struct GetSupportedImportFormatsResponse {
    pub ret: Vec<KeyFormat>,
}

#[derive(Clone, Debug)]
pub struct GetSupportedExportFormatsRequest {
    pub algorithm: Algorithm,
}
#[derive(Clone, Debug)]
pub struct GetSupportedExportFormatsResponse {
    pub ret: Vec<KeyFormat>,
}

/// A single command submitted to the engine.
#[derive(Clone, Debug)]
pub enum Request {
    GenerateKey(GenerateKeyRequest),
    ImportKey(ImportKeyRequest),
    ExportKey(ExportKeyRequest),
    GetKeyCharacteristics(GetKeyCharacteristicsRequest),
    Begin(BeginRequest),
    Update(UpdateRequest),
    Finish(FinishRequest),
    Abort(AbortRequest),
    GetSupportedAlgorithms(GetSupportedAlgorithmsRequest),
    GetSupportedBlockModes(GetSupportedBlockModesRequest),
    GetSupportedPaddingModes(GetSupportedPaddingModesRequest),
    GetSupportedDigests(GetSupportedDigestsRequest),
    GetSupportedImportFormats(GetSupportedImportFormatsRequest),
    GetSupportedExportFormats(GetSupportedExportFormatsRequest),
}

/// Body of a successful response, matching the request variant.
#[derive(Clone, Debug)]
pub enum RspBody {
    GenerateKey(GenerateKeyResponse),
    ImportKey(ImportKeyResponse),
    ExportKey(ExportKeyResponse),
    GetKeyCharacteristics(GetKeyCharacteristicsResponse),
    Begin(BeginResponse),
    Update(UpdateResponse),
    Finish(FinishResponse),
    Abort(AbortResponse),
    GetSupportedAlgorithms(GetSupportedAlgorithmsResponse),
    GetSupportedBlockModes(GetSupportedBlockModesResponse),
    GetSupportedPaddingModes(GetSupportedPaddingModesResponse),
    GetSupportedDigests(GetSupportedDigestsResponse),
    GetSupportedImportFormats(GetSupportedImportFormatsResponse),
    GetSupportedExportFormats(GetSupportedExportFormatsResponse),
}

/// Response to a [`Request`].  `rsp` is present exactly when `error_code` is
/// [`ErrorCode::Ok`].
#[derive(Clone, Debug)]
pub struct Response {
    pub error_code: ErrorCode,
    pub rsp: Option<RspBody>,
}
