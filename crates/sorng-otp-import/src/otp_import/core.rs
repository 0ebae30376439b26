//! Core OTP generation for RFC 4226 (HOTP) truncation and RFC 6238 (TOTP).
//!
//! Given a recovered [`Account`] and a unix timestamp, produces the code for
//! the active time-step, the code for the following one, and the seconds
//! left in the current window. Everything here is pure and cheap enough to
//! call once per second per account.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::otp_import::error::OtpError;
use crate::otp_import::types::*;
use crate::otp_import::uri::MAX_DIGITS;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw HMAC-OTP (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute an HOTP code for raw key bytes and a counter.
pub fn hotp(key: &[u8], counter: u64, digits: u8, algo: Algorithm) -> Result<String, OtpError> {
    if digits == 0 || digits > MAX_DIGITS {
        return Err(OtpError::invalid_parameters(format!(
            "digits must be 1..={}, got {}",
            MAX_DIGITS, digits
        )));
    }
    let mac = compute_hmac(key, &counter.to_be_bytes(), algo)?;
    Ok(truncate(&mac, digits))
}

fn compute_hmac(key: &[u8], data: &[u8], algo: Algorithm) -> Result<Vec<u8>, OtpError> {
    match algo {
        Algorithm::Sha1 => mac_digest::<Hmac<Sha1>>(key, data),
        Algorithm::Sha256 => mac_digest::<Hmac<Sha256>>(key, data),
        Algorithm::Sha512 => mac_digest::<Hmac<Sha512>>(key, data),
    }
}

fn mac_digest<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, OtpError> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| OtpError::invalid_secret(format!("HMAC key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Dynamic truncation per RFC 4226 §5.3.
fn truncate(mac: &[u8], digits: u8) -> String {
    // offset <= 15 and the shortest digest (SHA-1) is 20 bytes.
    let offset = (mac[mac.len() - 1] & 0x0f) as usize;
    let binary = ((mac[offset] as u64 & 0x7f) << 24)
        | ((mac[offset + 1] as u64) << 16)
        | ((mac[offset + 2] as u64) << 8)
        | (mac[offset + 3] as u64);
    let code = binary % 10u64.pow(digits as u32);
    format!("{:0>width$}", code, width = digits as usize)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Time steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Time-step counter for a unix timestamp. `period` must be non-zero.
pub fn time_step_at(unix_seconds: u64, period: u32) -> u64 {
    unix_seconds / period as u64
}

/// Seconds remaining in the window containing `unix_seconds` (1..=period).
pub fn seconds_remaining_at(unix_seconds: u64, period: u32) -> u32 {
    let p = period as u64;
    (p - (unix_seconds % p)) as u32
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Account-level generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate current and next codes for an account at the current time.
pub fn generate_code(account: &Account) -> Result<GeneratedCode, OtpError> {
    generate_code_at(account, current_unix_time())
}

/// Generate current and next codes for an account at `unix_seconds`.
///
/// `next` is computed from `counter + 1`, never from `unix_seconds + period`.
pub fn generate_code_at(account: &Account, unix_seconds: u64) -> Result<GeneratedCode, OtpError> {
    if account.period == 0 {
        return Err(OtpError::invalid_parameters("period must be positive"));
    }
    let key = decode_secret(&account.secret)?;
    let counter = time_step_at(unix_seconds, account.period);
    let current = hotp(&key, counter, account.digits, account.algorithm)?;
    let next = hotp(&key, counter.wrapping_add(1), account.digits, account.algorithm)?;

    Ok(GeneratedCode {
        account_id: account.id.clone(),
        current,
        next,
        seconds_remaining: seconds_remaining_at(unix_seconds, account.period),
        period: account.period,
        counter,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secret helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a base-32 secret: whitespace ignored, case-insensitive, padding optional.
pub fn decode_secret(b32: &str) -> Result<Vec<u8>, OtpError> {
    // ASCII-only case folding: non-ASCII letters stay as-is and are rejected below.
    let cleaned: String = b32
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let unpadded = cleaned.trim_end_matches('=');
    if unpadded.is_empty() {
        return Err(OtpError::invalid_secret("secret is empty"));
    }
    if let Some(bad) = unpadded.chars().find(|c| !matches!(c, 'A'..='Z' | '2'..='7')) {
        return Err(OtpError::invalid_secret(format!(
            "invalid base-32 character {:?}",
            bad
        )));
    }
    // RFC 4648 never leaves 1, 3 or 6 characters in the final quantum.
    if matches!(unpadded.len() % 8, 1 | 3 | 6) {
        return Err(OtpError::invalid_secret(format!(
            "base-32 secret has impossible length {}",
            unpadded.len()
        )));
    }
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, unpadded)
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| OtpError::invalid_secret("Invalid base-32 secret"))
}

/// Encode raw bytes to base-32 (no padding, uppercase).
pub fn encode_secret(bytes: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, bytes)
}

/// Current unix timestamp in seconds.
pub fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp_import::error::OtpErrorKind;

    // ── RFC 4226 test vectors (Appendix D) ───────────────────────
    // Secret: "12345678901234567890" (ASCII) → base32: GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ

    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn rfc_account(digits: u8, algo: Algorithm, secret: &str) -> Account {
        Account::new("rfc", "rfc", secret)
            .with_digits(digits)
            .with_algorithm(algo)
    }

    #[test]
    fn rfc4226_hotp_vectors() {
        let key = decode_secret(RFC_SECRET).unwrap();
        let expected = [
            "755224", "287082", "359152", "969429", "338314",
            "254676", "287922", "162583", "399871", "520489",
        ];
        for (counter, exp) in expected.iter().enumerate() {
            let code = hotp(&key, counter as u64, 6, Algorithm::Sha1).unwrap();
            assert_eq!(&code, exp, "HOTP mismatch at counter {}", counter);
        }
    }

    // ── RFC 6238 test vectors ────────────────────────────────────

    #[test]
    fn rfc6238_sha1_at_59() {
        let acct = rfc_account(8, Algorithm::Sha1, RFC_SECRET);
        let code = generate_code_at(&acct, 59).unwrap();
        assert_eq!(code.current, "94287082");
        assert_eq!(code.counter, 1);
        assert_eq!(code.seconds_remaining, 1);
    }

    #[test]
    fn rfc6238_sha1_table() {
        let acct = rfc_account(8, Algorithm::Sha1, RFC_SECRET);
        let table = [
            (1111111109u64, "07081804"),
            (1111111111, "14050471"),
            (1234567890, "89005924"),
            (2000000000, "69279037"),
            (20000000000, "65353130"),
        ];
        for (t, exp) in table {
            assert_eq!(generate_code_at(&acct, t).unwrap().current, exp, "T={}", t);
        }
    }

    #[test]
    fn rfc6238_sha256() {
        let secret = encode_secret(b"12345678901234567890123456789012");
        let acct = rfc_account(8, Algorithm::Sha256, &secret);
        assert_eq!(generate_code_at(&acct, 59).unwrap().current, "46119246");
    }

    #[test]
    fn rfc6238_sha512() {
        let secret =
            encode_secret(b"1234567890123456789012345678901234567890123456789012345678901234");
        let acct = rfc_account(8, Algorithm::Sha512, &secret);
        assert_eq!(generate_code_at(&acct, 59).unwrap().current, "90693936");
    }

    // ── Current / next / remaining ───────────────────────────────

    #[test]
    fn next_equals_current_one_period_later() {
        let acct = rfc_account(6, Algorithm::Sha1, RFC_SECRET);
        for t in [0u64, 1, 29, 30, 59, 1111111109] {
            let now = generate_code_at(&acct, t).unwrap();
            let later = generate_code_at(&acct, t + 30).unwrap();
            assert_eq!(now.next, later.current, "continuity broken at t={}", t);
        }
    }

    #[test]
    fn next_uses_counter_plus_one() {
        let acct = rfc_account(6, Algorithm::Sha1, RFC_SECRET);
        let code = generate_code_at(&acct, 59).unwrap();
        assert_eq!(code.current, "287082"); // counter 1
        assert_eq!(code.next, "359152"); // counter 2
    }

    #[test]
    fn crossing_boundary_changes_current() {
        let acct = rfc_account(6, Algorithm::Sha1, RFC_SECRET);
        let a = generate_code_at(&acct, 29).unwrap();
        let b = generate_code_at(&acct, 30).unwrap();
        assert_ne!(a.current, b.current);
        let c = generate_code_at(&acct, 0).unwrap();
        assert_eq!(a.current, c.current);
    }

    #[test]
    fn generation_is_deterministic() {
        let acct = rfc_account(6, Algorithm::Sha256, RFC_SECRET).with_period(45);
        assert_eq!(
            generate_code_at(&acct, 1_700_000_000).unwrap(),
            generate_code_at(&acct, 1_700_000_000).unwrap()
        );
    }

    #[test]
    fn time_step_calculation() {
        assert_eq!(time_step_at(0, 30), 0);
        assert_eq!(time_step_at(29, 30), 0);
        assert_eq!(time_step_at(30, 30), 1);
        assert_eq!(time_step_at(59, 30), 1);
        assert_eq!(time_step_at(60, 30), 2);
    }

    #[test]
    fn seconds_remaining_calculation() {
        assert_eq!(seconds_remaining_at(0, 30), 30);
        assert_eq!(seconds_remaining_at(1, 30), 29);
        assert_eq!(seconds_remaining_at(29, 30), 1);
        assert_eq!(seconds_remaining_at(30, 30), 30);
        assert_eq!(seconds_remaining_at(100, 60), 20);
    }

    #[test]
    fn codes_are_zero_padded() {
        let key = decode_secret(RFC_SECRET).unwrap();
        // counter 0 at 10 digits: P = 0x4c93cf18 = 1284755224
        assert_eq!(hotp(&key, 0, 10, Algorithm::Sha1).unwrap(), "1284755224");
        // 8-digit RFC vector with a leading zero
        let acct = rfc_account(8, Algorithm::Sha1, RFC_SECRET);
        assert!(generate_code_at(&acct, 1111111109).unwrap().current.starts_with('0'));
    }

    // ── Invalid input ────────────────────────────────────────────

    #[test]
    fn invalid_secret_reported() {
        let acct = Account::new("x", "x", "!!!INVALID!!!");
        let err = generate_code_at(&acct, 59).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidSecret);
    }

    #[test]
    fn zero_period_reported() {
        let acct = Account::new("x", "x", RFC_SECRET).with_period(0);
        let err = generate_code_at(&acct, 59).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidParameters);
    }

    #[test]
    fn out_of_range_digits_reported() {
        let key = decode_secret(RFC_SECRET).unwrap();
        assert!(hotp(&key, 0, 0, Algorithm::Sha1).is_err());
        assert!(hotp(&key, 0, 11, Algorithm::Sha1).is_err());
    }

    // ── Secret decoding ──────────────────────────────────────────

    #[test]
    fn decode_with_whitespace_and_case() {
        let clean = decode_secret("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(decode_secret("jbsw y3dp\tehpk\n3pxp").unwrap(), clean);
    }

    #[test]
    fn decode_with_padding() {
        // "hello" → NBSWY3DP (exactly 8 chars); "hi" → NBUQ====
        assert_eq!(decode_secret("NBUQ====").unwrap(), b"hi");
        assert_eq!(decode_secret("NBUQ").unwrap(), b"hi");
    }

    #[test]
    fn decode_rejects_bad_characters() {
        assert!(decode_secret("JBSW-Y3DP").is_err());
        assert!(decode_secret("JBSWY3DP1").is_err());
        assert!(decode_secret("NB=UQ").is_err());
        assert!(decode_secret("").is_err());
        assert!(decode_secret("  ==  ").is_err());
    }

    #[test]
    fn decode_rejects_non_ascii_letters() {
        // Unicode upper-casing would map these onto valid alphabet letters.
        for secret in ["JBSWY3DPEHPK3PXß", "JBSWY3DPEHPK3PXſ", "JBSWY3DPEHPK3PXı", "ＪBSWY3DP"] {
            let err = decode_secret(secret).unwrap_err();
            assert_eq!(err.kind, OtpErrorKind::InvalidSecret, "{:?}", secret);
        }
        let acct = Account::new("x", "x", "JBSWY3DPEHPK3PXß");
        assert_eq!(
            generate_code_at(&acct, 59).unwrap_err().kind,
            OtpErrorKind::InvalidSecret
        );
    }

    #[test]
    fn decode_rejects_impossible_lengths() {
        for secret in ["A", "AAA", "AAAAAA", "JBSWY3DPA", "JBSWY3DPAAA="] {
            assert_eq!(
                decode_secret(secret).unwrap_err().kind,
                OtpErrorKind::InvalidSecret,
                "{:?}",
                secret
            );
        }
        for secret in ["AA", "AAAA", "AAAAA", "AAAAAAA", "JBSWY3DP"] {
            assert!(decode_secret(secret).is_ok(), "{:?}", secret);
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let bytes = b"12345678901234567890";
        assert_eq!(encode_secret(bytes), RFC_SECRET);
        assert_eq!(decode_secret(RFC_SECRET).unwrap(), bytes);
    }
}
