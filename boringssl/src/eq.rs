//! Constant-time comparison based on BoringSSL.

use sks_common::crypto;

/// [`crypto::ConstTimeEq`] implementation based on BoringSSL.
#[derive(Clone, Default)]
pub struct BoringEq;

impl crypto::ConstTimeEq for BoringEq {
    fn eq(&self, left: &[u8], right: &[u8]) -> bool {
        if left.len() != right.len() {
            return false;
        }
        openssl::memcmp::eq(left, right)
    }
}
