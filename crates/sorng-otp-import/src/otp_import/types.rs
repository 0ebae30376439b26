//! Core types for authenticator store recovery.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::otp_import::error::OtpError;

/// Default TOTP time-step in seconds.
pub const DEFAULT_PERIOD: u32 = 30;
/// Default number of code digits.
pub const DEFAULT_DIGITS: u8 = 6;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hash algorithm used for HMAC-based OTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri_name())
    }
}

impl Algorithm {
    /// Parse from a case-insensitive string.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SHA1" | "SHA-1" | "HMACSHA1" | "HMAC-SHA1" => Some(Self::Sha1),
            "SHA256" | "SHA-256" | "HMACSHA256" | "HMAC-SHA256" => Some(Self::Sha256),
            "SHA512" | "SHA-512" | "HMACSHA512" | "HMAC-SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// URI-safe name for `otpauth://` parameters.
    pub fn uri_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Encrypted record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One raw row pulled from the encrypted store.
///
/// `blob` is `[12-byte nonce][ciphertext][16-byte tag]`. Serialised with the
/// blob as standard base64, the form store dumps carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub id: String,
    #[serde(with = "blob_base64")]
    pub blob: Vec<u8>,
}

impl EncryptedRecord {
    pub fn new(id: impl Into<String>, blob: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            blob,
        }
    }

    /// Build a record from a base64-encoded blob.
    pub fn from_base64(id: impl Into<String>, blob_b64: &str) -> Result<Self, OtpError> {
        let id = id.into();
        let blob = blob_base64::decode_str(blob_b64).map_err(|e| {
            OtpError::malformed_record(format!("blob is not base64: {}", e)).with_record(&id)
        })?;
        Ok(Self { id, blob })
    }
}

mod blob_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn decode_str(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(cleaned)
    }

    pub fn serialize<S: Serializer>(blob: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(blob))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        decode_str(&s).map_err(serde::de::Error::custom)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Decoded entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `Metadata` message of a decoded entry. Absent fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub name: String,
    pub note: String,
    pub id: String,
}

/// The `content` oneof of a decoded entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EntryContent {
    /// Neither branch set. Valid; yields no account.
    #[default]
    None,
    Totp { uri: String },
    Steam { secret: String },
}

/// A decrypted and decoded authenticator entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEntry {
    pub metadata: EntryMetadata,
    pub content: EntryContent,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  OTP parameters / account
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parameters recovered from an `otpauth://totp/…` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpParams {
    pub name: String,
    /// Empty when neither the query nor the label names an issuer.
    pub issuer: String,
    /// Base-32 secret exactly as it appeared in the URI.
    pub secret: String,
    pub algorithm: Algorithm,
    pub digits: u8,
    pub period: u32,
}

/// A recovered OTP account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Entry metadata id, or the store row id when the metadata has none.
    pub id: String,
    pub name: String,
    pub issuer: String,
    /// Base-32 secret in its original text form.
    pub secret: String,
    pub period: u32,
    pub digits: u8,
    pub algorithm: Algorithm,
    /// Free-text note from the entry metadata.
    #[serde(default)]
    pub note: String,
}

impl Account {
    /// Create an account with default period, digits and algorithm.
    pub fn new(id: impl Into<String>, name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            issuer: String::new(),
            secret: secret.into(),
            period: DEFAULT_PERIOD,
            digits: DEFAULT_DIGITS,
            algorithm: Algorithm::default(),
            note: String::new(),
        }
    }

    /// Build an account from parsed URI parameters.
    pub fn from_params(id: impl Into<String>, params: OtpParams) -> Self {
        Self {
            id: id.into(),
            name: params.name,
            issuer: params.issuer,
            secret: params.secret,
            period: params.period,
            digits: params.digits,
            algorithm: params.algorithm,
            note: String::new(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_algorithm(mut self, algo: Algorithm) -> Self {
        self.algorithm = algo;
        self
    }

    pub fn with_digits(mut self, digits: u8) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_period(mut self, period: u32) -> Self {
        self.period = period;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Display name: "Issuer (name)" or just "name".
    pub fn display_name(&self) -> String {
        if self.issuer.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.issuer, self.name)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generated code
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Current and next TOTP codes for one account at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub account_id: String,
    /// Code for the active time-step.
    pub current: String,
    /// Code for the following time-step.
    pub next: String,
    /// Seconds until `current` expires (1..=period).
    pub seconds_remaining: u32,
    pub period: u32,
    /// Time-step counter used for `current`.
    pub counter: u64,
}
