//! Record file I/O: the store rows as a JSON array of `{ "id", "blob" }`,
//! with `blob` in standard base64.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sorng_otp_import::otp_import::{EncryptedRecord, OtpError};

#[derive(Debug, Deserialize)]
struct RecordRow {
    #[serde(default)]
    id: String,
    blob: String,
}

/// Read every row. A row whose blob is not base64 comes back as a per-row
/// error so the rest of the batch still runs.
pub fn read_records(path: &Path) -> Result<Vec<Result<EncryptedRecord, OtpError>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading records {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("parsing records {}", path.display()))
}

pub fn parse_records(json: &str) -> Result<Vec<Result<EncryptedRecord, OtpError>>> {
    let rows: Vec<RecordRow> = serde_json::from_str(json)?;
    Ok(rows
        .into_iter()
        .map(|row| EncryptedRecord::from_base64(row.id, &row.blob))
        .collect())
}

/// Append records to the file, creating it when absent.
pub fn append_records(path: &Path, new: &[EncryptedRecord]) -> Result<()> {
    let mut existing: Vec<serde_json::Value> = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading records {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing records {}", path.display()))?
    } else {
        Vec::new()
    };
    for record in new {
        existing.push(serde_json::to_value(record)?);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&existing)?)
        .with_context(|| format!("writing records {}", path.display()))
}
