//! Store-key validation.
//!
//! The store key reaches us as user text: either 64 hex characters or the
//! base64 form of the same 32 bytes (padding optional). Anything that does
//! not normalise to exactly 32 bytes is rejected before decryption starts.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::otp_import::error::OtpError;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

const HEX_KEY_LEN: usize = KEY_LEN * 2;

const PADDING_OPTIONAL: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, PADDING_OPTIONAL);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, PADDING_OPTIONAL);

/// A validated 32-byte store key. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Wrap raw key bytes; any length other than 32 is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OtpError> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            OtpError::invalid_key(format!(
                "key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Normalise user-supplied key text into a [`SecretKey`].
pub fn validate_key(input: &str) -> Result<SecretKey, OtpError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(OtpError::invalid_key("key is empty"));
    }

    if trimmed.len() == HEX_KEY_LEN && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        let mut raw = hex::decode(trimmed)
            .map_err(|e| OtpError::invalid_key(format!("bad hex key: {}", e)))?;
        let key = SecretKey::from_bytes(&raw);
        raw.zeroize();
        return key;
    }

    let mut raw = STANDARD_LENIENT
        .decode(trimmed)
        .or_else(|_| URL_SAFE_LENIENT.decode(trimmed))
        .map_err(|_| {
            OtpError::invalid_key("key is neither 64 hex characters nor base64")
        })?;
    let key = SecretKey::from_bytes(&raw);
    raw.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp_import::error::OtpErrorKind;
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};

    fn sample_bytes() -> Vec<u8> {
        (0u8..32).map(|i| i.wrapping_mul(37).wrapping_add(250)).collect()
    }

    // ── Hex ──────────────────────────────────────────────────────

    #[test]
    fn hex_key_accepted() {
        let bytes = sample_bytes();
        let key = validate_key(&hex::encode(&bytes)).unwrap();
        assert_eq!(key.as_bytes().as_slice(), bytes.as_slice());
    }

    #[test]
    fn hex_key_uppercase_and_whitespace() {
        let bytes = sample_bytes();
        let input = format!("  {}\n", hex::encode_upper(&bytes));
        let key = validate_key(&input).unwrap();
        assert_eq!(key.as_bytes().as_slice(), bytes.as_slice());
    }

    #[test]
    fn hex_wrong_length_rejected() {
        let hex64 = hex::encode(sample_bytes());
        let err = validate_key(&hex64[..63]).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidKey);
        let err = validate_key(&format!("{}a", hex64)).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidKey);
    }

    // ── Base64 ───────────────────────────────────────────────────

    #[test]
    fn hex_and_base64_forms_agree() {
        let bytes = sample_bytes();
        let from_hex = validate_key(&hex::encode(&bytes)).unwrap();
        let from_b64 = validate_key(&STANDARD.encode(&bytes)).unwrap();
        assert_eq!(from_hex, from_b64);
    }

    #[test]
    fn base64_without_padding() {
        let bytes = sample_bytes();
        let key = validate_key(&STANDARD_NO_PAD.encode(&bytes)).unwrap();
        assert_eq!(key.as_bytes().as_slice(), bytes.as_slice());
    }

    #[test]
    fn base64_url_safe() {
        let bytes = vec![0xfb; 32];
        let key = validate_key(&URL_SAFE_NO_PAD.encode(&bytes)).unwrap();
        assert_eq!(key.as_bytes(), &[0xfb; 32]);
    }

    #[test]
    fn base64_wrong_length_rejected() {
        let err = validate_key(&STANDARD.encode([7u8; 16])).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidKey);
        let err = validate_key(&STANDARD.encode([7u8; 33])).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidKey);
    }

    // ── Garbage ──────────────────────────────────────────────────

    #[test]
    fn garbage_rejected() {
        assert!(validate_key("").is_err());
        assert!(validate_key("   ").is_err());
        assert!(validate_key("not a key!").is_err());
    }

    #[test]
    fn from_bytes_enforces_length() {
        assert!(SecretKey::from_bytes(&[0u8; 31]).is_err());
        assert!(SecretKey::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn debug_is_redacted() {
        let key = SecretKey::from_bytes(&[0xab; 32]).unwrap();
        let dbg = format!("{:?}", key);
        assert!(!dbg.contains("ab"));
        assert!(dbg.contains("redacted"));
    }
}
