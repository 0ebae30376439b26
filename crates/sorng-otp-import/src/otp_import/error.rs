//! Recovery-pipeline error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised pipeline error.
///
/// Callers branch on `kind`; `message` is for humans and never carries key
/// material, secrets or plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpError {
    pub kind: OtpErrorKind,
    pub message: String,
    /// Store-row id of the record that failed, if any.
    pub record_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtpErrorKind {
    /// Store key is not 64 hex chars or base64 of exactly 32 bytes.
    InvalidKey,
    /// Blob too short, auth-tag mismatch, or cipher failure.
    DecryptionFailed,
    /// Store row whose blob could not be read as bytes (not base64).
    MalformedRecord,
    /// Plaintext is not a well-formed authenticator entry message.
    SchemaError,
    /// `otpauth://` URI grammar violation or missing secret.
    InvalidUri,
    /// Entry type the pipeline cannot generate codes for (steam).
    UnsupportedEntry,
    /// Neither the entry metadata nor the store row carries an id.
    MissingIdentity,
    /// Secret is not valid base-32.
    InvalidSecret,
    /// Account carries a period or digit count that cannot produce a code.
    InvalidParameters,
}

pub type OtpResult<T> = Result<T, OtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl OtpError {
    pub fn new(kind: OtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            record_id: None,
        }
    }

    pub fn with_record(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::InvalidKey, msg)
    }

    pub fn decryption_failed(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::DecryptionFailed, msg)
    }

    pub fn malformed_record(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::MalformedRecord, msg)
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::SchemaError, msg)
    }

    pub fn invalid_uri(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::InvalidUri, msg)
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::UnsupportedEntry, msg)
    }

    pub fn missing_identity() -> Self {
        Self::new(
            OtpErrorKind::MissingIdentity,
            "entry has no metadata id and the store row id is empty",
        )
    }

    pub fn invalid_secret(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::InvalidSecret, msg)
    }

    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::InvalidParameters, msg)
    }

    /// Whether this error should abort a whole batch rather than one record.
    pub fn is_fatal(&self) -> bool {
        self.kind == OtpErrorKind::InvalidKey
    }
}

impl fmt::Display for OtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record_id {
            Some(id) => write!(f, "[{:?} record={}] {}", self.kind, id, self.message),
            None => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for OtpError {}

impl From<OtpError> for String {
    fn from(e: OtpError) -> String {
        e.to_string()
    }
}
