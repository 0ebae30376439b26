//! # SortOfRemote NG – Authenticator Store Recovery
//!
//! Recovers one-time-password accounts from an encrypted authenticator store
//! and generates their time-based codes:
//!
//! - **Key validation** – 64-char hex or base64 store keys, normalised to 32 bytes
//! - **AES-256-GCM** – per-record authenticated decryption (`nonce ‖ ciphertext ‖ tag`)
//! - **Entry decoding** – hand-rolled protobuf walk of the authenticator entry schema
//! - **otpauth:// URIs** – parsing & re-export per the Google Authenticator key-URI format
//! - **RFC 4226 / 6238** – HOTP truncation and TOTP current/next code generation
//! - **Batch pipeline** – per-record outcomes, wrong-key detection, 1 Hz code slots

pub mod otp_import;
