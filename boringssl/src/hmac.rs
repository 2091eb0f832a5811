//! HMAC implementation based on BoringSSL.

use crate::{digest_into_openssl, ossl};
use sks_common::{crypto, ks_err, Error};
use sks_wire::Digest;

/// [`crypto::Hmac`] implementation based on BoringSSL, via the `EVP_PKEY`
/// HMAC interface.
pub struct BoringHmac;

impl crypto::Hmac for BoringHmac {
    fn begin(
        &self,
        key: crypto::hmac::Key,
        digest: Digest,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        let digest = digest_into_openssl(digest)
            .ok_or_else(|| ks_err!(UnsupportedDigest, "HMAC requires a digest"))?;
        let pkey = ossl!(openssl::pkey::PKey::hmac(&key.0))?;
        Ok(Box::new(BoringHmacOperation { pkey, digest, pending_input: Vec::new() }))
    }
}

/// HMAC operation based on BoringSSL.  The `Signer` borrows the key, so the
/// input is accumulated and the MAC computed in `finish()`.
pub struct BoringHmacOperation {
    pkey: openssl::pkey::PKey<openssl::pkey::Private>,
    digest: openssl::hash::MessageDigest,
    pending_input: Vec<u8>,
}

impl crypto::AccumulatingOperation for BoringHmacOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.pending_input.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        let mut signer = ossl!(openssl::sign::Signer::new(self.digest, &self.pkey))?;
        ossl!(signer.update(&self.pending_input))?;
        let mac = ossl!(signer.sign_to_vec())?;
        Ok(mac)
    }
}
