//! High-level orchestrator: runs each store record through
//! decrypt → decode → parse, and turns accounts into code slots.
//!
//! Per-record failures never abort a batch; only an invalid store key does.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::otp_import::core;
use crate::otp_import::crypto;
use crate::otp_import::error::{OtpError, OtpErrorKind};
use crate::otp_import::key::{self, SecretKey};
use crate::otp_import::schema::{EntryDecoder, DEFAULT_MAX_ENTRY_LEN};
use crate::otp_import::types::*;
use crate::otp_import::uri;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pipeline tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Largest decrypted entry the decoder will accept, in bytes.
    pub max_entry_len: usize,
    /// Use `metadata.name` when the URI label carries no account name.
    pub name_from_metadata: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_entry_len: DEFAULT_MAX_ENTRY_LEN,
            name_from_metadata: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of running one store record through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RecordOutcome {
    Recovered { account: Account },
    /// Entry decoded fine but carries no OTP content.
    Empty { record_id: String },
    Failed { record_id: String, error: OtpError },
}

impl RecordOutcome {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Recovered { account } => Some(account),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&OtpError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Outcomes of one batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
}

/// Counts for user-facing messaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub recovered: usize,
    pub empty: usize,
    pub failed: usize,
    pub likely_wrong_key: bool,
}

impl BatchReport {
    pub fn accounts(&self) -> Vec<&Account> {
        self.outcomes.iter().filter_map(RecordOutcome::account).collect()
    }

    pub fn into_accounts(self) -> Vec<Account> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o {
                RecordOutcome::Recovered { account } => Some(account),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<&OtpError> {
        self.outcomes.iter().filter_map(RecordOutcome::error).collect()
    }

    pub fn empty_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Empty { .. }))
            .count()
    }

    /// A non-empty batch in which every record failed authentication. GCM
    /// cannot tell a wrong key from corruption per record, so an all-failed
    /// batch is reported as "incorrect key". Rows that never reached the
    /// cipher (`MalformedRecord`) say nothing about the key and do not count.
    pub fn likely_wrong_key(&self) -> bool {
        !self.outcomes.is_empty()
            && self.outcomes.iter().all(|o| {
                o.error()
                    .map(|e| e.kind == OtpErrorKind::DecryptionFailed)
                    .unwrap_or(false)
            })
    }

    pub fn summary(&self) -> BatchSummary {
        let recovered = self.accounts().len();
        let empty = self.empty_count();
        BatchSummary {
            total: self.outcomes.len(),
            recovered,
            empty,
            failed: self.outcomes.len() - recovered - empty,
            likely_wrong_key: self.likely_wrong_key(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Store-record recovery pipeline. Holds only immutable state, so one
/// instance can be shared across threads and batches.
#[derive(Debug, Clone)]
pub struct RecoveryPipeline {
    decoder: EntryDecoder,
    config: RecoveryConfig,
}

impl Default for RecoveryPipeline {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

impl RecoveryPipeline {
    pub fn new(config: RecoveryConfig) -> Self {
        let decoder = EntryDecoder::new().with_max_entry_len(config.max_entry_len);
        Self { decoder, config }
    }

    pub fn decoder(&self) -> &EntryDecoder {
        &self.decoder
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Validate `key_input`, then recover every record. An invalid key is
    /// returned as an error before any record is touched.
    pub fn recover_with_key_input(
        &self,
        records: &[EncryptedRecord],
        key_input: &str,
    ) -> Result<BatchReport, OtpError> {
        let key = key::validate_key(key_input).map_err(|e| {
            warn!("store key rejected: {}", e.message);
            e
        })?;
        Ok(self.recover(records, &key))
    }

    /// Recover every record; failures are captured per record.
    pub fn recover(&self, records: &[EncryptedRecord], key: &SecretKey) -> BatchReport {
        let outcomes: Vec<RecordOutcome> = records
            .iter()
            .map(|record| self.recover_record(record, key))
            .collect();
        let report = BatchReport { outcomes };

        let s = report.summary();
        info!(
            "recovered {}/{} records ({} empty, {} failed)",
            s.recovered, s.total, s.empty, s.failed
        );
        if s.likely_wrong_key {
            warn!("every record failed authentication; the store key is probably wrong");
        }
        report
    }

    /// Run one record through decrypt → decode → parse.
    pub fn recover_record(&self, record: &EncryptedRecord, key: &SecretKey) -> RecordOutcome {
        match self.try_recover(record, key) {
            Ok(Some(account)) => RecordOutcome::Recovered { account },
            Ok(None) => {
                debug!("record {} has no OTP content", record.id);
                RecordOutcome::Empty {
                    record_id: record.id.clone(),
                }
            }
            Err(error) => {
                let error = match error.record_id {
                    Some(_) => error,
                    None => error.with_record(&record.id),
                };
                warn!("skipping record {}: {:?}", record.id, error.kind);
                RecordOutcome::Failed {
                    record_id: record.id.clone(),
                    error,
                }
            }
        }
    }

    fn try_recover(
        &self,
        record: &EncryptedRecord,
        key: &SecretKey,
    ) -> Result<Option<Account>, OtpError> {
        let plaintext = crypto::decrypt_record(record, key)?;
        debug!("record {} decrypted ({} bytes)", record.id, plaintext.len());

        let entry = self.decoder.decode(&plaintext)?;
        let DecodedEntry { metadata, content } = entry;

        let uri = match content {
            EntryContent::None => return Ok(None),
            EntryContent::Steam { .. } => {
                return Err(OtpError::unsupported(
                    "steam entries are not supported for code generation",
                ))
            }
            EntryContent::Totp { uri } => uri,
        };

        let id = resolve_identity(&metadata.id, &record.id)?;
        let mut params = uri::parse_otpauth_uri(&uri)?;
        if params.name.is_empty() && self.config.name_from_metadata {
            params.name = metadata.name.clone();
        }
        Ok(Some(Account::from_params(id, params).with_note(metadata.note)))
    }
}

/// Metadata id first, then the store row id; both empty is an error.
fn resolve_identity(metadata_id: &str, record_id: &str) -> Result<String, OtpError> {
    [metadata_id, record_id]
        .into_iter()
        .find(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(OtpError::missing_identity)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Code slots
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Display state of one account on a refresh tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum CodeState {
    Ready { code: GeneratedCode },
    Error { kind: OtpErrorKind, message: String },
}

/// One account's code state on a refresh tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSlot {
    pub account_id: String,
    pub display_name: String,
    pub state: CodeState,
}

/// Generate codes for every account at `unix_seconds`. An account whose
/// secret cannot be used gets an error slot; the others are unaffected.
pub fn generate_codes(accounts: &[Account], unix_seconds: u64) -> Vec<CodeSlot> {
    accounts
        .iter()
        .map(|account| {
            let state = match core::generate_code_at(account, unix_seconds) {
                Ok(code) => CodeState::Ready { code },
                Err(e) => {
                    debug!("no code for account {}: {:?}", account.id, e.kind);
                    CodeState::Error {
                        kind: e.kind,
                        message: e.message,
                    }
                }
            };
            CodeSlot {
                account_id: account.id.clone(),
                display_name: account.display_name(),
                state,
            }
        })
        .collect()
}
