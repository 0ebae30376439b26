pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod records;

use std::io::Write;

use anyhow::Result;
use sorng_otp_import::otp_import::core::current_unix_time;
use sorng_otp_import::otp_import::pipeline::{generate_codes, BatchReport};
use sorng_otp_import::otp_import::RecoveryPipeline;

use cli::{Cli, Command};
use commands::SealRequest;
use config::AppConfig;

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    logging::init_logging(&config.log_level, config.json_logs)?;

    let pipeline = RecoveryPipeline::new(config.recovery.clone());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Import { json } => {
            let report = recover(&pipeline, &config)?;
            commands::ensure_key_matches(&report)?;
            commands::write_report(&mut out, &report, json)?;
        }
        Command::Codes { at } => {
            let report = recover(&pipeline, &config)?;
            commands::ensure_key_matches(&report)?;
            let accounts = report.into_accounts();
            let slots = generate_codes(&accounts, at.unwrap_or_else(current_unix_time));
            commands::write_codes(&mut out, &slots)?;
        }
        Command::Watch { .. } => {
            let report = recover(&pipeline, &config)?;
            commands::ensure_key_matches(&report)?;
            let accounts = report.into_accounts();
            tracing::info!(accounts = accounts.len(), "watching codes");
            commands::watch(&accounts, config.refresh_interval(), None, &mut out).await?;
        }
        Command::Seal {
            id,
            uri,
            name,
            note,
            append,
        } => {
            let key_input = config.read_key_input()?;
            let request = SealRequest { id, uri, name, note };
            let record = commands::seal(&request, &key_input)?;
            if append {
                let path = config.records_path()?;
                records::append_records(&path, std::slice::from_ref(&record))?;
                tracing::info!(id = %record.id, path = %path.display(), "record appended");
            } else {
                serde_json::to_writer(&mut out, &record)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

fn recover(pipeline: &RecoveryPipeline, config: &AppConfig) -> Result<BatchReport> {
    let key_input = config.read_key_input()?;
    commands::recover_file(pipeline, &config.records_path()?, &key_input)
}
