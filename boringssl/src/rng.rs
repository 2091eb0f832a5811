//! Random number generation based on BoringSSL.

use sks_common::crypto;

/// [`crypto::Rng`] implementation based on BoringSSL.
#[derive(Default)]
pub struct BoringRng;

impl crypto::Rng for BoringRng {
    fn add_entropy(&mut self, data: &[u8]) {
        // BoringSSL's RNG reseeds itself from the kernel and takes no
        // caller-provided entropy.
        let _ = data;
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        openssl::rand::rand_bytes(dest).expect("RNG failure"); // must not continue unfilled
    }
}
