use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sorng_otp_import::otp_import::RecoveryConfig;

/// Directory created under the platform config dir.
pub const APP_DIR_NAME: &str = "otp-import";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_KEY_ENV: &str = "OTP_STORE_KEY";
pub const RECORDS_FILE_NAME: &str = "records.json";

/// Settings loaded from `config.json`. Every field has a default so a
/// partial (or missing) file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON array of `{ "id", "blob" }` rows exported from the store.
    pub records_path: Option<PathBuf>,
    /// Environment variable holding the store key.
    pub key_env: String,
    pub log_level: String,
    pub json_logs: bool,
    pub refresh_interval_secs: u64,
    pub recovery: RecoveryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            records_path: None,
            key_env: DEFAULT_KEY_ENV.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            refresh_interval_secs: 1,
            recovery: RecoveryConfig::default(),
        }
    }
}

/// `<config dir>/otp-import/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults; a malformed
    /// one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path`, or from the default location when `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match default_config_path() {
                Some(p) => Self::load(&p),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing config {}", path.display()))
    }

    /// The records file: configured path, else `records.json` next to the
    /// default config.
    pub fn records_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.records_path {
            return Ok(p.clone());
        }
        match dirs::config_dir() {
            Some(d) => Ok(d.join(APP_DIR_NAME).join(RECORDS_FILE_NAME)),
            None => bail!("no records file configured and no platform config dir"),
        }
    }

    /// Refresh cadence of the watch loop, never below one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Read the store key from the configured environment variable.
    pub fn read_key_input(&self) -> Result<String> {
        match std::env::var(&self.key_env) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            Ok(_) => bail!("store key variable {} is empty", self.key_env),
            Err(_) => bail!("store key not set: export {}=<64-char hex or base64 key>", self.key_env),
        }
    }
}
