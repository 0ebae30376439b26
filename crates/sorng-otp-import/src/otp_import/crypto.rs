//! Per-record authenticated decryption.
//!
//! - **Cipher**: AES-256-GCM
//! - **Blob layout**: `[12-byte nonce][ciphertext][16-byte tag]`
//! - **AAD**: the constant `entrycontent`, identical for every record
//!
//! The tag is verified by `aes-gcm` before any plaintext is handed back, so a
//! tampered or wrongly-keyed record yields an error and never partial output.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};

use crate::otp_import::error::OtpError;
use crate::otp_import::key::SecretKey;
use crate::otp_import::types::EncryptedRecord;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// AES-256-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Smallest well-formed blob (empty ciphertext).
pub const MIN_BLOB_LEN: usize = NONCE_LEN + TAG_LEN;
/// Associated data bound to every entry record.
pub const ENTRY_AAD: &[u8] = b"entrycontent";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Decrypt / seal
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decrypt one store record into its plaintext entry bytes.
pub fn decrypt_record(record: &EncryptedRecord, key: &SecretKey) -> Result<Vec<u8>, OtpError> {
    let blob = record.blob.as_slice();
    if blob.len() < MIN_BLOB_LEN {
        return Err(OtpError::decryption_failed(format!(
            "blob is {} bytes, need at least {}",
            blob.len(),
            MIN_BLOB_LEN
        ))
        .with_record(&record.id));
    }

    let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| {
        OtpError::decryption_failed(format!("AES init: {}", e)).with_record(&record.id)
    })?;

    // aes-gcm expects `ciphertext ‖ tag` contiguous, which is exactly the
    // remainder of the blob after the nonce.
    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: sealed,
                aad: ENTRY_AAD,
            },
        )
        .map_err(|_| {
            OtpError::decryption_failed("authentication failed: wrong key or corrupted record")
                .with_record(&record.id)
        })
}

/// Encrypt entry bytes into the store blob layout.
pub fn seal_record(
    key: &SecretKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, OtpError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| OtpError::decryption_failed(format!("AES init: {}", e)))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad: ENTRY_AAD,
            },
        )
        .map_err(|e| OtpError::decryption_failed(format!("AES encrypt: {}", e)))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
    blob.extend_from_slice(nonce);
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp_import::error::OtpErrorKind;

    fn key(fill: u8) -> SecretKey {
        SecretKey::from_bytes(&[fill; 32]).unwrap()
    }

    fn sealed(plaintext: &[u8]) -> EncryptedRecord {
        let blob = seal_record(&key(1), &[9u8; NONCE_LEN], plaintext).unwrap();
        EncryptedRecord::new("rec", blob)
    }

    // ── Layout ───────────────────────────────────────────────────

    #[test]
    fn sealed_blob_layout() {
        let rec = sealed(b"hello");
        assert_eq!(rec.blob.len(), NONCE_LEN + 5 + TAG_LEN);
        assert_eq!(&rec.blob[..NONCE_LEN], &[9u8; NONCE_LEN]);
    }

    #[test]
    fn decrypt_recovers_plaintext() {
        let rec = sealed(b"entry bytes");
        assert_eq!(decrypt_record(&rec, &key(1)).unwrap(), b"entry bytes");
    }

    #[test]
    fn random_key_and_nonce() {
        let key = SecretKey::from_bytes(&rand::random::<[u8; 32]>()).unwrap();
        let nonce: [u8; NONCE_LEN] = rand::random();
        let blob = seal_record(&key, &nonce, b"otpauth://totp/x?secret=AAAA").unwrap();
        let rec = EncryptedRecord::new("rand", blob);
        assert_eq!(
            decrypt_record(&rec, &key).unwrap(),
            b"otpauth://totp/x?secret=AAAA"
        );
    }

    #[test]
    fn decrypt_empty_ciphertext() {
        let rec = sealed(b"");
        assert_eq!(rec.blob.len(), MIN_BLOB_LEN);
        assert!(decrypt_record(&rec, &key(1)).unwrap().is_empty());
    }

    // ── Failures ─────────────────────────────────────────────────

    #[test]
    fn short_blob_rejected() {
        let rec = EncryptedRecord::new("short", vec![0u8; MIN_BLOB_LEN - 1]);
        let err = decrypt_record(&rec, &key(1)).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::DecryptionFailed);
        assert_eq!(err.record_id.as_deref(), Some("short"));
    }

    #[test]
    fn wrong_key_rejected() {
        let rec = sealed(b"data");
        let err = decrypt_record(&rec, &key(2)).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::DecryptionFailed);
    }

    #[test]
    fn every_single_bit_flip_rejected() {
        let rec = sealed(b"tamper me");
        for byte in 0..rec.blob.len() {
            for bit in 0..8 {
                let mut blob = rec.blob.clone();
                blob[byte] ^= 1 << bit;
                let tampered = EncryptedRecord::new("rec", blob);
                assert!(
                    decrypt_record(&tampered, &key(1)).is_err(),
                    "flip at byte {} bit {} was accepted",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn different_aad_rejected() {
        let cipher = Aes256Gcm::new_from_slice(key(1).as_bytes()).unwrap();
        let nonce = [3u8; NONCE_LEN];
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: b"data",
                    aad: b"othercontent",
                },
            )
            .unwrap();
        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&sealed);
        let rec = EncryptedRecord::new("aad", blob);
        assert!(decrypt_record(&rec, &key(1)).is_err());
    }
}
