//! Helper functionality for working with tags.

use crate::{
    contains_tag_value, crypto,
    crypto::{aes, ec, hmac, KeyMaterial},
    get_bool_tag_value, get_opt_tag_value, get_tag_value, ks_err, Error,
};
use alloc::vec::Vec;
use log::warn;
use sks_wire::{
    Algorithm, BlockMode, Digest, EcCurve, ErrorCode, KeyFormat, KeyParam, KeyPurpose,
    KeySizeInBits, PaddingMode, RsaExponent, Tag,
};

#[cfg(test)]
mod tests;

/// The set of tags that are added to key characteristics by the engine itself
/// and must not appear in caller-supplied generation/import parameters.
pub const AUTO_ADDED_TAGS: &[Tag] = &[Tag::Origin, Tag::CreationDatetime];

/// Tags that only make sense as per-operation parameters, never as key
/// characteristics.
pub const OPERATION_ONLY_TAGS: &[Tag] = &[Tag::Nonce, Tag::AssociatedData, Tag::AeadTag];

/// Macro to retrieve the (single) value of a tag in a collection of
/// `KeyParam`s.  There can be only one.
#[macro_export]
macro_rules! get_tag_value {
    { $params:expr, $variant:ident, $err:expr } => {
        {
            let mut result = None;
            let mut count = 0;
            for param in $params {
                if let $crate::wire::KeyParam::$variant(v) = param {
                    count += 1;
                    result = Some(v.clone());
                }
            }
            match count {
                0 => Err($crate::ks_verr!($err, "missing tag {}", stringify!($variant))),
                1 => Ok(result.unwrap()),  /* safe: count=1 => exists */
                _ => Err($crate::ks_verr!($err, "duplicate tag {}", stringify!($variant))),
            }
        }
    }
}

/// Macro to retrieve the value of an optional single-valued tag in a
/// collection of `KeyParam`s.  It may or may not be present, but multiple
/// instances of the tag are assumed to be invalid.
#[macro_export]
macro_rules! get_opt_tag_value {
    { $params:expr, $variant:ident } => {
        get_opt_tag_value!($params, $variant, InvalidTag)
    };
    { $params:expr, $variant:ident, $dup_error:ident } => {
        {
            let mut result = None;
            let mut count = 0;
            for param in $params {
                if let $crate::wire::KeyParam::$variant(v) = param {
                    count += 1;
                    result = Some(v);
                }
            }
            match count {
                0 => Ok(None),
                1 => Ok(Some(result.unwrap())),  /* safe: count=1 => exists */
                _ => Err($crate::ks_err!($dup_error, "duplicate tag {}", stringify!($variant))),
            }
        }
    }
}

/// Macro to retrieve a `bool` tag value, returning `false` if the tag is absent.
#[macro_export]
macro_rules! get_bool_tag_value {
    { $params:expr, $variant:ident } => {
        {
            let mut count = 0;
            for param in $params {
                if let $crate::wire::KeyParam::$variant = param {
                    count += 1;
                }
            }
            match count {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err($crate::ks_err!(InvalidTag, "duplicate tag {}", stringify!($variant))),
            }
        }
    }
}

/// Macro to check whether a collection of `KeyParam`s holds a value matching
/// the given value.
#[macro_export]
macro_rules! contains_tag_value {
    { $params:expr, $variant:ident, $value:expr } => {
        {
            let mut found = false;
            for param in $params {
                if let $crate::wire::KeyParam::$variant(v) = param {
                    if *v == $value {
                        found = true;
                    }
                }
            }
            found
        }
    }
}

/// Get the configured algorithm from a set of parameters.
pub fn get_algorithm(params: &[KeyParam]) -> Result<Algorithm, Error> {
    get_tag_value!(params, Algorithm, ErrorCode::UnsupportedAlgorithm)
}

/// Get the configured block mode from a set of parameters.
pub fn get_block_mode(params: &[KeyParam]) -> Result<BlockMode, Error> {
    get_tag_value!(params, BlockMode, ErrorCode::UnsupportedBlockMode)
}

/// Get the configured padding mode from a set of parameters.
pub fn get_padding_mode(params: &[KeyParam]) -> Result<PaddingMode, Error> {
    get_tag_value!(params, Padding, ErrorCode::UnsupportedPaddingMode)
}

/// Get the configured digest from a set of parameters.
pub fn get_digest(params: &[KeyParam]) -> Result<Digest, Error> {
    get_tag_value!(params, Digest, ErrorCode::UnsupportedDigest)
}

/// Return the length in bits of a [`Digest`] function.
pub fn digest_len(digest: Digest) -> Result<u32, Error> {
    match digest {
        Digest::Md5 => Ok(128),
        Digest::Sha1 => Ok(160),
        Digest::Sha224 => Ok(224),
        Digest::Sha256 => Ok(256),
        Digest::Sha384 => Ok(384),
        Digest::Sha512 => Ok(512),
        Digest::None => Err(ks_err!(IncompatibleDigest, "invalid digest {:?}", digest)),
    }
}

/// Information needed to generate a key of the requested kind.
#[derive(Clone, Debug)]
pub enum KeyGenInfo {
    Aes(aes::Variant),
    Hmac(KeySizeInBits),
    Rsa(KeySizeInBits, RsaExponent),
    Ec(EcCurve),
}

/// Return an error if any of the `exclude` tags are found in `params`.
fn reject_tags(params: &[KeyParam], exclude: &[Tag]) -> Result<(), Error> {
    for param in params {
        if exclude.contains(&param.tag()) {
            return Err(ks_err!(InvalidTag, "tag {:?} not allowed", param.tag()));
        }
    }
    Ok(())
}

/// Copy across any entries in `src` whose tag appears in `tags` into `dest`.
fn transcribe_tags(dest: &mut Vec<KeyParam>, src: &[KeyParam], tags: &[Tag]) {
    for param in src {
        if tags.iter().any(|t| *t == param.tag()) {
            dest.push(param.clone());
        }
    }
}

/// Common validity checks for key generation/import parameters.
fn check_creation_params(params: &[KeyParam]) -> Result<(), Error> {
    // Input params should not contain anything the engine adds itself, nor
    // per-operation parameters.
    if params.iter().any(|p| AUTO_ADDED_TAGS.contains(&p.tag())) {
        return Err(ks_err!(InvalidTag, "engine-added tag included on key generation/import"));
    }
    reject_tags(params, OPERATION_ONLY_TAGS)
}

/// Build the set of key characteristics for a key that is about to be
/// generated, checking parameter validity along the way.  Also return the
/// information needed for key generation.
pub fn extract_key_gen_characteristics(
    params: &[KeyParam],
) -> Result<(Vec<KeyParam>, KeyGenInfo), Error> {
    check_creation_params(params)?;
    match get_algorithm(params)? {
        Algorithm::Rsa => extract_rsa_gen_characteristics(params),
        Algorithm::Ec => extract_ec_gen_characteristics(params),
        Algorithm::Aes => extract_aes_gen_characteristics(params),
        Algorithm::Hmac => extract_hmac_gen_characteristics(params),
    }
}

/// Build the set of key characteristics for a key that is about to be
/// imported, checking parameter validity along the way, and verifying that
/// caller-asserted attributes match the imported material.
pub fn extract_key_import_characteristics(
    imp: &crypto::Implementation,
    params: &[KeyParam],
    key_format: KeyFormat,
    key_data: &[u8],
) -> Result<(Vec<KeyParam>, KeyMaterial), Error> {
    check_creation_params(params)?;
    match get_algorithm(params)? {
        Algorithm::Rsa => extract_rsa_import_characteristics(&*imp.rsa, params, key_format, key_data),
        Algorithm::Ec => extract_ec_import_characteristics(&*imp.ec, params, key_format, key_data),
        Algorithm::Aes => extract_aes_import_characteristics(&*imp.aes, params, key_format, key_data),
        Algorithm::Hmac => {
            extract_hmac_import_characteristics(&*imp.hmac, params, key_format, key_data)
        }
    }
}

/// Check that an RSA key size is valid for generation.
fn check_rsa_key_size(key_size: KeySizeInBits) -> Result<(), Error> {
    if key_size.0 % 64 != 0 || !(256..=4096).contains(&key_size.0) {
        return Err(ks_err!(UnsupportedKeySize, "unsupported KEY_SIZE {:?} bits for RSA", key_size));
    }
    Ok(())
}

fn extract_rsa_gen_characteristics(
    params: &[KeyParam],
) -> Result<(Vec<KeyParam>, KeyGenInfo), Error> {
    // For key generation, size and public exponent must be explicitly specified.
    let key_size = get_tag_value!(params, KeySize, ErrorCode::UnsupportedKeySize)?;
    check_rsa_key_size(key_size)?;
    let public_exponent = get_tag_value!(params, RsaPublicExponent, ErrorCode::InvalidArgument)?;

    let mut chars = alloc::vec![
        KeyParam::Algorithm(Algorithm::Rsa),
        KeyParam::KeySize(key_size),
        KeyParam::RsaPublicExponent(public_exponent),
    ];
    extract_rsa_characteristics(params, &mut chars)?;
    Ok((chars, KeyGenInfo::Rsa(key_size, public_exponent)))
}

fn extract_rsa_import_characteristics(
    rsa: &dyn crypto::Rsa,
    params: &[KeyParam],
    key_format: KeyFormat,
    key_data: &[u8],
) -> Result<(Vec<KeyParam>, KeyMaterial), Error> {
    // Deduce key size and exponent from the imported data.
    if key_format != KeyFormat::Pkcs8 {
        return Err(ks_err!(
            UnsupportedKeyFormat,
            "unsupported import format {:?}, expect PKCS8",
            key_format
        ));
    }
    let (key, key_size, public_exponent) = rsa.import_pkcs8_key(key_data)?;

    // If key size or exponent are explicitly asserted, they must match.
    if let Some(param_key_size) = get_opt_tag_value!(params, KeySize)? {
        if *param_key_size != key_size {
            return Err(ks_err!(
                ImportParameterMismatch,
                "specified KEY_SIZE {:?} bits != actual key size {:?} for PKCS8 import",
                param_key_size,
                key_size
            ));
        }
    }
    if let Some(param_public_exponent) = get_opt_tag_value!(params, RsaPublicExponent)? {
        if *param_public_exponent != public_exponent {
            return Err(ks_err!(
                ImportParameterMismatch,
                "specified RSA_PUBLIC_EXPONENT {:?} != actual exponent {:?} for PKCS8 import",
                param_public_exponent,
                public_exponent,
            ));
        }
    }
    check_rsa_key_size(key_size)?;

    let mut chars = alloc::vec![
        KeyParam::Algorithm(Algorithm::Rsa),
        KeyParam::KeySize(key_size),
        KeyParam::RsaPublicExponent(public_exponent),
    ];
    extract_rsa_characteristics(params, &mut chars)?;
    Ok((chars, key))
}

fn extract_rsa_characteristics(
    params: &[KeyParam],
    chars: &mut Vec<KeyParam>,
) -> Result<(), Error> {
    for param in params {
        match param {
            KeyParam::Purpose(purpose) => chars.push(KeyParam::Purpose(*purpose)),
            KeyParam::Padding(pmode) => match pmode {
                PaddingMode::None
                | PaddingMode::RsaOaep
                | PaddingMode::RsaPss
                | PaddingMode::RsaPkcs115Encrypt
                | PaddingMode::RsaPkcs115Sign => chars.push(KeyParam::Padding(*pmode)),
                PaddingMode::Pkcs7 => {
                    warn!("Generating RSA key with invalid padding {:?}", pmode);
                    chars.push(KeyParam::Padding(*pmode));
                }
            },
            KeyParam::Digest(digest) => chars.push(KeyParam::Digest(*digest)),
            _ => {}
        }
    }
    transcribe_tags(chars, params, &[Tag::NoAuthRequired]);
    reject_tags(params, &[Tag::BlockMode, Tag::EcCurve, Tag::CallerNonce, Tag::MacLength])?;
    Ok(())
}

fn extract_ec_gen_characteristics(
    params: &[KeyParam],
) -> Result<(Vec<KeyParam>, KeyGenInfo), Error> {
    // The curve may be specified directly, or implied by the key size.
    let curve = ec_curve_from_params(params)?;
    let mut chars = alloc::vec![
        KeyParam::Algorithm(Algorithm::Ec),
        KeyParam::EcCurve(curve),
        KeyParam::KeySize(ec::curve_key_size(curve)),
    ];
    extract_ec_characteristics(params, &mut chars)?;
    Ok((chars, KeyGenInfo::Ec(curve)))
}

fn ec_curve_from_params(params: &[KeyParam]) -> Result<EcCurve, Error> {
    match (get_opt_tag_value!(params, EcCurve)?, get_opt_tag_value!(params, KeySize)?) {
        (Some(curve), None) => Ok(*curve),
        (None, Some(key_size)) => ec::curve_from_key_size(*key_size),
        (Some(curve), Some(key_size)) => {
            if ec::curve_key_size(*curve) != *key_size {
                return Err(ks_err!(
                    InvalidArgument,
                    "invalid curve ({:?}) / key size ({:?}) combination",
                    curve,
                    key_size
                ));
            }
            Ok(*curve)
        }
        (None, None) => {
            Err(ks_err!(UnsupportedKeySize, "neither EC_CURVE nor KEY_SIZE specified"))
        }
    }
}

fn extract_ec_import_characteristics(
    ec_impl: &dyn crypto::Ec,
    params: &[KeyParam],
    key_format: KeyFormat,
    key_data: &[u8],
) -> Result<(Vec<KeyParam>, KeyMaterial), Error> {
    if key_format != KeyFormat::Pkcs8 {
        return Err(ks_err!(
            UnsupportedKeyFormat,
            "unsupported import format {:?}, expect PKCS8",
            key_format
        ));
    }
    let (key, curve) = ec_impl.import_pkcs8_key(key_data)?;

    // If curve or key size are explicitly asserted, they must match.
    if let Some(param_curve) = get_opt_tag_value!(params, EcCurve)? {
        if *param_curve != curve {
            return Err(ks_err!(
                ImportParameterMismatch,
                "specified EC_CURVE {:?} != actual curve {:?} for PKCS8 import",
                param_curve,
                curve
            ));
        }
    }
    if let Some(param_key_size) = get_opt_tag_value!(params, KeySize)? {
        if *param_key_size != ec::curve_key_size(curve) {
            return Err(ks_err!(
                ImportParameterMismatch,
                "specified KEY_SIZE {:?} bits != actual curve size {:?} for PKCS8 import",
                param_key_size,
                ec::curve_key_size(curve)
            ));
        }
    }

    let mut chars = alloc::vec![
        KeyParam::Algorithm(Algorithm::Ec),
        KeyParam::EcCurve(curve),
        KeyParam::KeySize(ec::curve_key_size(curve)),
    ];
    extract_ec_characteristics(params, &mut chars)?;
    Ok((chars, key))
}

fn extract_ec_characteristics(params: &[KeyParam], chars: &mut Vec<KeyParam>) -> Result<(), Error> {
    for param in params {
        match param {
            KeyParam::Purpose(purpose) => {
                match purpose {
                    KeyPurpose::Sign | KeyPurpose::Verify => {}
                    _ => warn!("Generating EC key with invalid purpose {:?}", purpose),
                }
                chars.push(KeyParam::Purpose(*purpose));
            }
            KeyParam::Digest(digest) => chars.push(KeyParam::Digest(*digest)),
            _ => {}
        }
    }
    transcribe_tags(chars, params, &[Tag::NoAuthRequired]);
    reject_tags(
        params,
        &[Tag::BlockMode, Tag::CallerNonce, Tag::RsaPublicExponent, Tag::MacLength],
    )?;
    Ok(())
}

fn extract_aes_gen_characteristics(
    params: &[KeyParam],
) -> Result<(Vec<KeyParam>, KeyGenInfo), Error> {
    // For key generation, the size must be explicitly specified.
    let key_size = get_tag_value!(params, KeySize, ErrorCode::UnsupportedKeySize)?;
    let keygen_info = match key_size {
        KeySizeInBits(128) => KeyGenInfo::Aes(aes::Variant::Aes128),
        KeySizeInBits(192) => KeyGenInfo::Aes(aes::Variant::Aes192),
        KeySizeInBits(256) => KeyGenInfo::Aes(aes::Variant::Aes256),
        _ => {
            return Err(ks_err!(
                UnsupportedKeySize,
                "unsupported KEY_SIZE {:?} bits for AES",
                key_size
            ))
        }
    };

    let mut chars = alloc::vec![KeyParam::Algorithm(Algorithm::Aes), KeyParam::KeySize(key_size)];
    extract_aes_characteristics(params, &mut chars)?;
    Ok((chars, keygen_info))
}

fn extract_aes_import_characteristics(
    aes_impl: &dyn crypto::Aes,
    params: &[KeyParam],
    key_format: KeyFormat,
    key_data: &[u8],
) -> Result<(Vec<KeyParam>, KeyMaterial), Error> {
    require_raw(key_format)?;
    let (key, key_size) = aes_impl.import_key(key_data)?;
    require_matching_key_size(params, key_size)?;

    let mut chars = alloc::vec![KeyParam::Algorithm(Algorithm::Aes), KeyParam::KeySize(key_size)];
    extract_aes_characteristics(params, &mut chars)?;
    Ok((chars, key))
}

fn extract_aes_characteristics(
    params: &[KeyParam],
    chars: &mut Vec<KeyParam>,
) -> Result<(), Error> {
    for param in params {
        match param {
            KeyParam::Purpose(purpose) => chars.push(KeyParam::Purpose(*purpose)),
            KeyParam::BlockMode(bmode) => chars.push(KeyParam::BlockMode(*bmode)),
            KeyParam::Padding(pmode) => match pmode {
                PaddingMode::None | PaddingMode::Pkcs7 => chars.push(KeyParam::Padding(*pmode)),
                p => {
                    return Err(ks_err!(IncompatiblePaddingMode, "invalid padding mode {:?}", p))
                }
            },
            KeyParam::CallerNonce => chars.push(KeyParam::CallerNonce),
            _ => {}
        }
    }
    transcribe_tags(chars, params, &[Tag::NoAuthRequired]);
    reject_tags(params, &[Tag::EcCurve, Tag::RsaPublicExponent, Tag::Digest, Tag::MacLength])?;
    Ok(())
}

fn extract_hmac_gen_characteristics(
    params: &[KeyParam],
) -> Result<(Vec<KeyParam>, KeyGenInfo), Error> {
    // For key generation the size must be explicitly specified.
    let key_size = get_tag_value!(params, KeySize, ErrorCode::UnsupportedKeySize)?;
    hmac::valid_size(key_size)?;
    let mut chars = alloc::vec![KeyParam::Algorithm(Algorithm::Hmac), KeyParam::KeySize(key_size)];
    extract_hmac_characteristics(params, &mut chars)?;
    Ok((chars, KeyGenInfo::Hmac(key_size)))
}

fn extract_hmac_import_characteristics(
    hmac_impl: &dyn crypto::Hmac,
    params: &[KeyParam],
    key_format: KeyFormat,
    key_data: &[u8],
) -> Result<(Vec<KeyParam>, KeyMaterial), Error> {
    require_raw(key_format)?;
    let (key, key_size) = hmac_impl.import_key(key_data)?;
    require_matching_key_size(params, key_size)?;

    let mut chars = alloc::vec![KeyParam::Algorithm(Algorithm::Hmac), KeyParam::KeySize(key_size)];
    extract_hmac_characteristics(params, &mut chars)?;
    Ok((chars, key))
}

fn extract_hmac_characteristics(
    params: &[KeyParam],
    chars: &mut Vec<KeyParam>,
) -> Result<(), Error> {
    let digest = get_tag_value!(params, Digest, ErrorCode::UnsupportedDigest)?;
    match digest {
        Digest::Sha1 | Digest::Sha224 | Digest::Sha256 | Digest::Sha384 | Digest::Sha512 => {}
        d => return Err(ks_err!(UnsupportedDigest, "unsupported digest {:?} for HMAC", d)),
    }
    chars.push(KeyParam::Digest(digest));

    // A key-declared MAC length acts as the default when begin() omits one.
    if let Some(mac_len) = get_opt_tag_value!(params, MacLength)? {
        if mac_len % 8 != 0 || *mac_len > digest_len(digest)? {
            return Err(ks_err!(
                UnsupportedMacLength,
                "unsupported key MAC_LENGTH {} bits",
                mac_len
            ));
        }
        chars.push(KeyParam::MacLength(*mac_len));
    }

    transcribe_tags(chars, params, &[Tag::Purpose, Tag::NoAuthRequired]);
    reject_tags(params, &[Tag::BlockMode, Tag::EcCurve, Tag::CallerNonce, Tag::RsaPublicExponent])?;
    Ok(())
}

/// Check for `KeyFormat::Raw`.
fn require_raw(key_format: KeyFormat) -> Result<(), Error> {
    if key_format != KeyFormat::Raw {
        return Err(ks_err!(
            UnsupportedKeyFormat,
            "unsupported import format {:?}, expect RAW",
            key_format
        ));
    }
    Ok(())
}

/// Check that any `Tag::KeySize` value, if specified, matches.
fn require_matching_key_size(params: &[KeyParam], key_size: KeySizeInBits) -> Result<(), Error> {
    if let Some(param_key_size) = get_opt_tag_value!(params, KeySize)? {
        if *param_key_size != key_size {
            return Err(ks_err!(
                ImportParameterMismatch,
                "specified KEY_SIZE {:?} bits != actual key size {:?}",
                param_key_size,
                key_size
            ));
        }
    }
    Ok(())
}

/// Check that an operation with the given `purpose` and `params` can validly
/// be started using a key with characteristics `chars`.
pub fn check_begin_params(
    chars: &[KeyParam],
    purpose: KeyPurpose,
    params: &[KeyParam],
) -> Result<(), Error> {
    // The key itself must permit the requested purpose.
    let algo = get_algorithm(chars)?;
    if !contains_tag_value!(chars, Purpose, purpose) {
        return Err(ks_err!(
            IncompatiblePurpose,
            "purpose {:?} not in key characteristics",
            purpose
        ));
    }
    let valid_purpose = matches!(
        (algo, purpose),
        (Algorithm::Aes, KeyPurpose::Encrypt)
            | (Algorithm::Aes, KeyPurpose::Decrypt)
            | (Algorithm::Hmac, KeyPurpose::Sign)
            | (Algorithm::Hmac, KeyPurpose::Verify)
            | (Algorithm::Ec, KeyPurpose::Sign)
            | (Algorithm::Ec, KeyPurpose::Verify)
            | (Algorithm::Rsa, _)
    );
    if !valid_purpose {
        return Err(ks_err!(
            IncompatiblePurpose,
            "invalid purpose {:?} for {:?} key",
            purpose,
            algo
        ));
    }

    let nonce = get_opt_tag_value!(params, Nonce)?;
    if get_bool_tag_value!(chars, CallerNonce)? {
        // Caller-provided nonces are allowed.
    } else if nonce.is_some() && purpose == KeyPurpose::Encrypt {
        return Err(ks_err!(CallerNonceProhibited, "caller nonce not allowed for encryption"));
    }

    // For various parameters, if they are specified in the begin parameters
    // the same value must also exist in the key characteristics.
    let bmode_to_find = get_opt_tag_value!(params, BlockMode, UnsupportedBlockMode)?;
    let pmode_to_find = get_opt_tag_value!(params, Padding, UnsupportedPaddingMode)?;
    let digest_to_find = get_opt_tag_value!(params, Digest, UnsupportedDigest)?;

    // Further algorithm-specific checks.
    match algo {
        Algorithm::Rsa => check_begin_rsa_params(chars, purpose, params),
        Algorithm::Ec => check_begin_ec_params(purpose, params),
        Algorithm::Aes => check_begin_aes_params(params, nonce.map(|v| v.as_ref())),
        Algorithm::Hmac => check_begin_hmac_params(chars, purpose, params),
    }?;

    if let Some(bmode) = bmode_to_find {
        if !contains_tag_value!(chars, BlockMode, *bmode) {
            return Err(ks_err!(
                UnsupportedBlockMode,
                "block mode {:?} not in key characteristics",
                bmode,
            ));
        }
    }
    if let Some(pmode) = pmode_to_find {
        if !contains_tag_value!(chars, Padding, *pmode) {
            return Err(ks_err!(
                IncompatiblePaddingMode,
                "padding mode {:?} not in key characteristics",
                pmode,
            ));
        }
    }
    if let Some(digest) = digest_to_find {
        if !contains_tag_value!(chars, Digest, *digest) {
            return Err(ks_err!(
                IncompatibleDigest,
                "digest {:?} not in key characteristics",
                digest,
            ));
        }
    }

    Ok(())
}

/// Indicate whether a [`KeyPurpose`] is for encryption/decryption.
fn for_encryption(purpose: KeyPurpose) -> bool {
    purpose == KeyPurpose::Encrypt || purpose == KeyPurpose::Decrypt
}

/// Indicate whether a [`KeyPurpose`] is for signing/verification.
fn for_signing(purpose: KeyPurpose) -> bool {
    purpose == KeyPurpose::Sign || purpose == KeyPurpose::Verify
}

fn check_begin_rsa_params(
    chars: &[KeyParam],
    purpose: KeyPurpose,
    params: &[KeyParam],
) -> Result<(), Error> {
    let padding = get_padding_mode(params)?;
    let digest = get_opt_tag_value!(params, Digest)?.copied();
    match padding {
        PaddingMode::None => {
            if for_signing(purpose) {
                // Raw signatures work on the undigested message.
                if digest.is_some() && digest != Some(Digest::None) {
                    return Err(ks_err!(
                        IncompatibleDigest,
                        "digest {:?} not valid for raw RSA signing",
                        digest
                    ));
                }
            }
        }
        PaddingMode::RsaOaep if for_encryption(purpose) => {
            if digest.is_none() || digest == Some(Digest::None) {
                return Err(ks_err!(IncompatibleDigest, "digest required for RSA-OAEP"));
            }
        }
        PaddingMode::RsaPss if for_signing(purpose) => {
            let digest = digest
                .ok_or_else(|| ks_err!(IncompatibleDigest, "digest required for RSA-PSS"))?;
            // Key must be at least 10 bytes larger than the digest, to leave
            // room for at least eight bytes of random salt.
            let key_size_bits = get_tag_value!(chars, KeySize, ErrorCode::InvalidArgument)?;
            let d = digest_len(digest)?;
            if key_size_bits.0 < d + 8 * 10 {
                return Err(ks_err!(
                    IncompatibleDigest,
                    "key size {:?} too small for RSA-PSS with digest {:?}",
                    key_size_bits,
                    digest
                ));
            }
        }
        PaddingMode::RsaPkcs115Sign if for_signing(purpose) => {
            let digest = digest.ok_or_else(|| {
                ks_err!(IncompatibleDigest, "digest required for RSA-PKCS1_1_5_SIGN")
            })?;
            if digest != Digest::None {
                // Room is needed for the 11-byte padding structure plus the
                // 19-byte DigestInfo overhead.
                let key_size_bits = get_tag_value!(chars, KeySize, ErrorCode::InvalidArgument)?;
                let d = digest_len(digest)?;
                if key_size_bits.0 < d + 8 * 30 {
                    return Err(ks_err!(
                        IncompatibleDigest,
                        "key size {:?} too small for RSA-PKCS1 sign with digest {:?}",
                        key_size_bits,
                        digest
                    ));
                }
            }
        }
        PaddingMode::RsaPkcs115Encrypt if for_encryption(purpose) => {
            if digest.is_some() && digest != Some(Digest::None) {
                warn!("ignoring digest {:?} provided for PKCS#1 v1.5 encryption/decryption", digest);
            }
        }
        _ => {
            return Err(ks_err!(
                UnsupportedPaddingMode,
                "purpose {:?} incompatible with padding {:?}",
                purpose,
                padding
            ))
        }
    }
    Ok(())
}

fn check_begin_ec_params(purpose: KeyPurpose, params: &[KeyParam]) -> Result<(), Error> {
    if for_signing(purpose) {
        let _digest = get_digest(params)?;
    }
    Ok(())
}

fn check_begin_aes_params(params: &[KeyParam], caller_nonce: Option<&[u8]>) -> Result<(), Error> {
    let bmode = get_block_mode(params)?;
    let padding = get_padding_mode(params)?;

    if bmode == BlockMode::Gcm {
        let mac_len = get_tag_value!(params, MacLength, ErrorCode::UnsupportedMacLength)?;
        if mac_len % 8 != 0 || !(96..=128).contains(&mac_len) {
            return Err(ks_err!(UnsupportedMacLength, "invalid GCM tag length {} bits", mac_len));
        }
    }
    match bmode {
        BlockMode::Gcm | BlockMode::Ctr => {
            if padding != PaddingMode::None {
                return Err(ks_err!(
                    IncompatiblePaddingMode,
                    "padding {:?} not valid for AES GCM/CTR",
                    padding
                ));
            }
        }
        BlockMode::Ecb | BlockMode::Cbc => match padding {
            PaddingMode::None | PaddingMode::Pkcs7 => {}
            _ => {
                return Err(ks_err!(
                    IncompatiblePaddingMode,
                    "padding {:?} not valid for AES ECB/CBC",
                    padding
                ))
            }
        },
    }

    if let Some(nonce) = caller_nonce {
        match bmode {
            BlockMode::Cbc if nonce.len() == 16 => {}
            BlockMode::Ctr if nonce.len() == 16 => {}
            BlockMode::Gcm if nonce.len() == 12 => {}
            _ => {
                return Err(ks_err!(
                    InvalidNonce,
                    "invalid caller nonce len {} for {:?}",
                    nonce.len(),
                    bmode
                ))
            }
        }
    }
    Ok(())
}

fn check_begin_hmac_params(
    chars: &[KeyParam],
    purpose: KeyPurpose,
    params: &[KeyParam],
) -> Result<(), Error> {
    let digest = get_digest(params)?;
    // Resolving the MAC length also validates it.
    let _mac_len = hmac_mac_length(chars, params, digest)?;
    let _ = purpose;
    Ok(())
}

/// Resolve the MAC length (in bits) for an HMAC operation: the begin-time
/// value is authoritative, falling back to any length baked into the key
/// characteristics, then to the full digest width.
pub fn hmac_mac_length(
    chars: &[KeyParam],
    params: &[KeyParam],
    digest: Digest,
) -> Result<u32, Error> {
    let mac_len = match get_opt_tag_value!(params, MacLength)? {
        Some(v) => *v,
        None => match get_opt_tag_value!(chars, MacLength)? {
            Some(v) => *v,
            None => digest_len(digest)?,
        },
    };
    if mac_len % 8 != 0 || mac_len > digest_len(digest)? {
        return Err(ks_err!(
            UnsupportedMacLength,
            "MAC length {} bits invalid for digest {:?}",
            mac_len,
            digest
        ));
    }
    Ok(mac_len)
}
