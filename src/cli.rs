use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(
    name = "otp-import",
    version,
    about = "Recover TOTP accounts from an encrypted authenticator store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to <config dir>/otp-import/config.json).
    #[arg(long, global = true, env = "OTP_IMPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Records file exported from the store.
    #[arg(long, global = true)]
    pub records: Option<PathBuf>,

    /// Environment variable holding the store key.
    #[arg(long, global = true)]
    pub key_env: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decrypt every record and list the recovered accounts.
    Import {
        /// Print accounts and the batch summary as JSON (includes secrets).
        #[arg(long)]
        json: bool,
    },
    /// Print current and next codes once.
    Codes {
        /// Unix time to generate codes for, instead of the wall clock.
        #[arg(long)]
        at: Option<u64>,
    },
    /// Refresh codes every interval until Ctrl-C.
    Watch {
        /// Refresh interval in seconds.
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Encrypt one otpauth:// URI into a store record.
    Seal {
        #[arg(long)]
        id: String,
        #[arg(long)]
        uri: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        note: String,
        /// Append to the records file instead of printing the row.
        #[arg(long)]
        append: bool,
    },
}

impl Cli {
    /// Flags given on the command line win over the config file.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(p) = &self.records {
            config.records_path = Some(p.clone());
        }
        if let Some(k) = &self.key_env {
            config.key_env = k.clone();
        }
        if let Some(l) = &self.log_level {
            config.log_level = l.clone();
        }
        if self.json_logs {
            config.json_logs = true;
        }
        if let Command::Watch {
            interval: Some(secs),
        } = self.command
        {
            config.refresh_interval_secs = secs;
        }
    }
}
