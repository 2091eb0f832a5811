//! Data types shared between the keystore engine and its callers.

#![no_std]
extern crate alloc;

pub mod messages;
pub mod types;

pub use messages::*;
pub use types::*;

/// Key size in bits.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeySizeInBits(pub u32);

/// RSA public exponent.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RsaExponent(pub u64);

/// Opaque identifier for an in-flight operation.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationHandle(pub u64);

/// Marker type indicating failure to convert into an `enum` variant.
#[derive(Debug)]
pub struct ValueNotRecognized;

/// Macro to implement `TryFrom<i32>` for an enum carrying an `enumn::N` derive.
#[macro_export]
macro_rules! try_from_n {
    { $ename:ident } => {
        impl core::convert::TryFrom<i32> for $ename {
            type Error = $crate::ValueNotRecognized;
            fn try_from(value: i32) -> Result<Self, Self::Error> {
                Self::n(value).ok_or($crate::ValueNotRecognized)
            }
        }
    };
}
