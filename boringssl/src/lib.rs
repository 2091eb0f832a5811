//! Implementations of the [`sks_common::crypto`] traits based on
//! BoringSSL/OpenSSL.

extern crate alloc;

use openssl::hash::MessageDigest;
use sks_wire::Digest;

pub mod aes;
pub mod ec;
pub mod eq;
pub mod hmac;
pub mod rng;
pub mod rsa;


pub use aes::BoringAes;
pub use ec::BoringEc;
pub use eq::BoringEq;
pub use hmac::BoringHmac;
pub use rng::BoringRng;
pub use rsa::BoringRsa;

/// Build a complete [`sks_common::crypto::Implementation`] backed by this
/// crate.
pub fn implementation() -> sks_common::crypto::Implementation {
    sks_common::crypto::Implementation {
        aes: Box::new(BoringAes),
        rsa: Box::new(BoringRsa),
        ec: Box::new(BoringEc),
        hmac: Box::new(BoringHmac),
        compare: Box::new(BoringEq),
    }
}

/// Macro to auto-generate error mapping around invocations of `openssl`
/// methods.  An invocation like:
///
/// ```ignore
/// let x = ossl!(y.func(a, b))?;
/// ```
///
/// will map to:
///
/// ```ignore
/// let x = y.func(a, b).map_err(openssl_err!("failed to perform: y.func(a, b)"))?;
/// ```
#[macro_export]
macro_rules! ossl {
    { $e:expr } => {
        $e.map_err($crate::openssl_err!(concat!("failed to perform: ", stringify!($e))))
    }
}

/// Macro to emit a closure that builds an [`sks_common::Error`] instance from
/// an openssl `ErrorStack` together with a format-like message.
#[macro_export]
macro_rules! openssl_err {
    { $($arg:tt)+ } => {
        |e| sks_common::Error::Engine(
            sks_wire::ErrorCode::UnknownError,
            format!("{}:{}: {}: {:?}", file!(), line!(), format_args!($($arg)+), e)
        )
    };
}

/// Macro to emit a closure that builds an [`sks_common::Error`] instance from
/// an openssl `ErrorStack` together with a format-like message, using the
/// given `ErrorCode` instead of the default.
#[macro_export]
macro_rules! openssl_err_or {
    { $error_code:ident, $($arg:tt)+ } => {
        |e| sks_common::Error::Engine(
            sks_wire::ErrorCode::$error_code,
            format!("{}:{}: {}: {:?}", file!(), line!(), format_args!($($arg)+), e)
        )
    };
}

/// Translate a [`Digest`] into an OpenSSL [`MessageDigest`].
pub(crate) fn digest_into_openssl(digest: Digest) -> Option<MessageDigest> {
    match digest {
        Digest::None => None,
        Digest::Md5 => Some(MessageDigest::md5()),
        Digest::Sha1 => Some(MessageDigest::sha1()),
        Digest::Sha224 => Some(MessageDigest::sha224()),
        Digest::Sha256 => Some(MessageDigest::sha256()),
        Digest::Sha384 => Some(MessageDigest::sha384()),
        Digest::Sha512 => Some(MessageDigest::sha512()),
    }
}
