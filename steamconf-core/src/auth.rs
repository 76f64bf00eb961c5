//! Time-based confirmation keys for signed mobile confirmation requests.
//!
//! A key is `HMAC-SHA1(identity_secret, time || tag)` where `time` occupies
//! eight big-endian bytes (upper four zero) and `tag` is at most 32 bytes.

use crate::{ConfirmationError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

type HmacSha1 = Hmac<Sha1>;

/// Maximum number of tag bytes that contribute to the signed buffer.
pub const MAX_TAG_BYTES: usize = 32;

/// Generate a percent-encoded confirmation key, ready to embed in a query string.
pub fn generate_confirmation_key(identity_secret: &str, time: i64, tag: &str) -> Result<String> {
    let encoded = generate_confirmation_key_raw(identity_secret, time, tag)?;
    Ok(percent_encode(&encoded))
}

/// Generate the base64 confirmation key without URL escaping.
pub fn generate_confirmation_key_raw(identity_secret: &str, time: i64, tag: &str) -> Result<String> {
    let time = u32::try_from(time).map_err(|_| {
        ConfirmationError::AuthGeneration(format!("time {} is outside the 32-bit range", time))
    })?;

    let secret = Zeroizing::new(STANDARD.decode(identity_secret.trim()).map_err(|e| {
        ConfirmationError::AuthGeneration(format!("identity secret is not valid base64: {}", e))
    })?);

    let tag_bytes = tag.as_bytes();
    let tag_bytes = &tag_bytes[..tag_bytes.len().min(MAX_TAG_BYTES)];

    let mut source = Vec::with_capacity(8 + tag_bytes.len());
    source.extend_from_slice(&0u32.to_be_bytes());
    source.extend_from_slice(&time.to_be_bytes());
    source.extend_from_slice(tag_bytes);

    let mut mac = HmacSha1::new_from_slice(&secret).map_err(|_| {
        ConfirmationError::AuthGeneration("identity secret rejected as HMAC key".to_string())
    })?;
    mac.update(&source);

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Escape everything outside the `encodeURIComponent` unreserved set.
pub(crate) fn percent_encode(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            other => {
                out.push('%');
                out.push(HEX[(other >> 4) as usize] as char);
                out.push(HEX[(other & 0x0f) as usize] as char);
            }
        }
    }
    out
}
