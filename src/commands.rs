use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use sorng_otp_import::otp_import::crypto::{self, NONCE_LEN};
use sorng_otp_import::otp_import::pipeline::{
    generate_codes, BatchReport, BatchSummary, CodeSlot, CodeState, RecordOutcome,
};
use sorng_otp_import::otp_import::{
    uri, validate_key, Account, DecodedEntry, EncryptedRecord, EntryContent, EntryDecoder,
    EntryMetadata, OtpError, RecoveryPipeline, SecretKey,
};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::records;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Recovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run already-read rows through the pipeline. Rows that failed to load
/// keep their error and their position.
pub fn recover_rows(
    pipeline: &RecoveryPipeline,
    rows: Vec<Result<EncryptedRecord, OtpError>>,
    key: &SecretKey,
) -> BatchReport {
    let outcomes = rows
        .into_iter()
        .map(|row| match row {
            Ok(record) => pipeline.recover_record(&record, key),
            Err(error) => RecordOutcome::Failed {
                record_id: error.record_id.clone().unwrap_or_default(),
                error,
            },
        })
        .collect();
    let report = BatchReport { outcomes };

    let s = report.summary();
    info!(
        total = s.total,
        recovered = s.recovered,
        empty = s.empty,
        failed = s.failed,
        "batch recovered"
    );
    report
}

/// Validate the key, read the records file and recover every row. An
/// invalid key fails before the file is opened.
pub fn recover_file(
    pipeline: &RecoveryPipeline,
    records_path: &Path,
    key_input: &str,
) -> Result<BatchReport> {
    let key = validate_key(key_input).context("invalid store key")?;
    let rows = records::read_records(records_path)?;
    Ok(recover_rows(pipeline, rows, &key))
}

/// Fail the command when no record in a non-empty batch authenticated.
pub fn ensure_key_matches(report: &BatchReport) -> Result<()> {
    if report.likely_wrong_key() {
        warn!("every record failed authentication");
        bail!(
            "incorrect key: none of the {} records could be decrypted",
            report.outcomes.len()
        );
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
struct ImportOutput<'a> {
    accounts: Vec<&'a Account>,
    summary: BatchSummary,
}

/// Print a batch. Text output never includes secrets.
pub fn write_report<W: Write>(out: &mut W, report: &BatchReport, json: bool) -> Result<()> {
    if json {
        let output = ImportOutput {
            accounts: report.accounts(),
            summary: report.summary(),
        };
        serde_json::to_writer_pretty(&mut *out, &output)?;
        writeln!(out)?;
        return Ok(());
    }

    for outcome in &report.outcomes {
        match outcome {
            RecordOutcome::Recovered { account } => writeln!(
                out,
                "ok      {:<16} {} ({}, {} digits, {}s)",
                account.id,
                account.display_name(),
                account.algorithm,
                account.digits,
                account.period
            )?,
            RecordOutcome::Empty { record_id } => writeln!(out, "empty   {}", record_id)?,
            RecordOutcome::Failed { record_id, error } => {
                writeln!(out, "failed  {:<16} {}", record_id, error)?
            }
        }
    }
    let s = report.summary();
    writeln!(
        out,
        "{} recovered, {} empty, {} failed ({} records)",
        s.recovered, s.empty, s.failed, s.total
    )?;
    Ok(())
}

pub fn write_codes<W: Write>(out: &mut W, slots: &[CodeSlot]) -> Result<()> {
    for slot in slots {
        match &slot.state {
            CodeState::Ready { code } => writeln!(
                out,
                "{:<32} {}  next {}  {:>2}s",
                slot.display_name, code.current, code.next, code.seconds_remaining
            )?,
            CodeState::Error { kind, message } => {
                writeln!(out, "{:<32} ------  {:?}: {}", slot.display_name, kind, message)?
            }
        }
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Watch loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Regenerate codes on every tick until Ctrl-C, or until `max_ticks`
/// ticks have been rendered. Returns the number of ticks rendered.
pub async fn watch<W: Write>(
    accounts: &[Account],
    every: Duration,
    max_ticks: Option<u64>,
    out: &mut W,
) -> Result<u64> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let slots = generate_codes(accounts, sorng_otp_import::otp_import::core::current_unix_time());
                write_codes(out, &slots)?;
                writeln!(out)?;
                out.flush()?;
                ticks += 1;
                if max_ticks.map_or(false, |max| ticks >= max) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted, stopping refresh");
                break;
            }
        }
    }
    Ok(ticks)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Seal
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct SealRequest {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub note: String,
}

/// Encrypt one URI into a store record under a fresh random nonce. The URI
/// must parse, so a sealed record is always recoverable.
pub fn seal(request: &SealRequest, key_input: &str) -> Result<EncryptedRecord> {
    let key = validate_key(key_input).context("invalid store key")?;
    uri::parse_otpauth_uri(&request.uri).context("refusing to seal an unusable URI")?;

    let entry = DecodedEntry {
        metadata: EntryMetadata {
            name: request.name.clone(),
            note: request.note.clone(),
            id: request.id.clone(),
        },
        content: EntryContent::Totp {
            uri: request.uri.clone(),
        },
    };
    let plaintext = EntryDecoder::new().encode(&entry);
    let nonce: [u8; NONCE_LEN] = rand::random();
    let blob = crypto::seal_record(&key, &nonce, &plaintext)?;
    Ok(EncryptedRecord::new(request.id.clone(), blob))
}
