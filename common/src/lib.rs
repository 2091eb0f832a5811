//! Functionality for the software keystore engine that is shared between the
//! engine facade and the crypto backends.

#![no_std]
extern crate alloc;

use alloc::{format, string::String, vec::Vec};
use core::fmt::Write;
use sks_wire::ErrorCode;

/// Re-export of the wire types crate.
pub use sks_wire as wire;

pub mod authset;
pub mod crypto;
pub mod keyblob;
pub mod tag;

/// General error type: an [`ErrorCode`] for the caller plus a debug message
/// describing where and why the failure happened.
#[derive(Debug)]
pub enum Error {
    Engine(ErrorCode, String),
}

// The following macros for error generation allow the message portion to be
// automatically compiled out in future, avoiding potential information
// leakage and allocation.

/// Macro to build an [`Error::Engine`] instance for an [`ErrorCode`] value
/// known at compile time: `ks_err!(InvalidKeyBlob, "some {} format", arg)`.
#[macro_export]
macro_rules! ks_err {
    { $error_code:ident, $($arg:tt)+ } => {
        $crate::Error::Engine($crate::wire::ErrorCode::$error_code,
                              alloc::format!("{}:{}: {}", file!(), line!(), format_args!($($arg)+))) };
}

/// Macro to build an [`Error::Engine`] instance from an [`ErrorCode`]
/// expression: `ks_verr!(rc, "some {} format", arg)`.
#[macro_export]
macro_rules! ks_verr {
    { $error_code:expr, $($arg:tt)+ } => {
        $crate::Error::Engine($error_code,
                              alloc::format!("{}:{}: {}", file!(), line!(), format_args!($($arg)+))) };
}

impl Error {
    /// Return the wire-level error code for the error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Engine(code, _) => *code,
        }
    }
}

impl From<Error> for ErrorCode {
    fn from(e: Error) -> Self {
        e.code()
    }
}

impl From<der::Error> for Error {
    fn from(e: der::Error) -> Self {
        Error::Engine(ErrorCode::UnknownError, format!("ASN.1 DER error: {:?}", e))
    }
}

impl From<pkcs1::Error> for Error {
    fn from(e: pkcs1::Error) -> Self {
        Error::Engine(ErrorCode::UnknownError, format!("PKCS#1 error: {:?}", e))
    }
}

/// Check for an expected error.
#[macro_export]
macro_rules! expect_err {
    ($result:expr, $err_msg:expr) => {
        assert!(
            $result.is_err(),
            "Expected error containing '{}', got success {:?}",
            $err_msg,
            $result
        );
        let err = $result.err();
        assert!(
            alloc::format!("{:?}", err).contains($err_msg),
            "Unexpected error {:?}, doesn't contain '{}'",
            err,
            $err_msg
        );
    };
}

/// Convert data to a hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut result = String::new();
    for byte in data {
        let _ = &write!(result, "{:02x}", byte);
    }
    result
}

/// Convert a hex string to data.
pub fn hex_decode(hex: &str) -> Result<Vec<u8>, String> {
    let mut result = Vec::new();
    let mut pending = 0u8;
    for (idx, c) in hex.chars().enumerate() {
        let nibble: u8 = match c {
            '0'..='9' => (c as u8) - b'0',
            'a'..='f' => (c as u8) - b'a' + 10,
            'A'..='F' => (c as u8) - b'A' + 10,
            _ => return Err(format!("char {} '{}' not a hex digit", idx, c)),
        };
        if idx % 2 == 0 {
            pending = nibble << 4;
        } else {
            result.push(pending | nibble);
        }
    }
    Ok(result)
}
