//! Configuration for grid extraction.
//!
//! Priority for the config file:
//! 1. An explicit path (the CLI's `--config`)
//! 2. `GRIDTAP_CONFIG`
//! 3. `<config_dir>/gridtap/config.json`, when it exists
//! 4. Built-in defaults
//!
//! `GRIDTAP_TMP_DIR` overrides the export folder after loading. Empty
//! environment values are ignored.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use encoding_rs::Encoding;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::StrategyKind;
use crate::table::{ColumnType, ColumnTypes};

/// Class name of the trading client's grid control.
pub const DEFAULT_GRID_CLASS: &str = "CVirtualGridCtrl";

/// Title text of the static control that marks a captcha dialog.
pub const DEFAULT_CAPTCHA_TITLE: &str = "验证码";

/// Identifier-like columns that must never be read as numbers (leading
/// zeros are significant).
const TEXT_COLUMNS: &[&str] = &[
    "操作日期",
    "委托编号",
    "申请编号",
    "合同编号",
    "证券代码",
    "股东代码",
    "成交编号",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid captcha title pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown text encoding '{0}'")]
    UnknownEncoding(String),
}

/// Fixed waits and retry bounds, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Settle delay after posting the copy command.
    pub message_settle_ms: u64,
    /// Interval between save-dialog polls.
    pub save_dialog_poll_ms: u64,
    pub save_dialog_attempts: u32,
    /// Delay after writing the export path.
    pub save_path_settle_ms: u64,
    /// Delay after confirming the save dialog.
    pub export_settle_ms: u64,
    /// Delay after dismissing a leftover popup.
    pub popup_dismiss_ms: u64,
    /// How long to look for a captcha dialog.
    pub captcha_probe_ms: u64,
    pub captcha_settle_ms: u64,
    /// How long a submitted captcha dialog gets to close.
    pub captcha_dismiss_ms: u64,
    pub captcha_refresh_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            message_settle_ms: 100,
            save_dialog_poll_ms: 200,
            save_dialog_attempts: 10,
            save_path_settle_ms: 100,
            export_settle_ms: 200,
            popup_dismiss_ms: 200,
            captcha_probe_ms: 1000,
            captcha_settle_ms: 100,
            captcha_dismiss_ms: 500,
            captcha_refresh_ms: 100,
        }
    }
}

impl Timings {
    pub fn message_settle(&self) -> Duration {
        Duration::from_millis(self.message_settle_ms)
    }

    pub fn save_dialog_poll(&self) -> Duration {
        Duration::from_millis(self.save_dialog_poll_ms)
    }

    pub fn save_path_settle(&self) -> Duration {
        Duration::from_millis(self.save_path_settle_ms)
    }

    pub fn export_settle(&self) -> Duration {
        Duration::from_millis(self.export_settle_ms)
    }

    pub fn popup_dismiss(&self) -> Duration {
        Duration::from_millis(self.popup_dismiss_ms)
    }

    pub fn captcha_probe(&self) -> Duration {
        Duration::from_millis(self.captcha_probe_ms)
    }

    pub fn captcha_settle(&self) -> Duration {
        Duration::from_millis(self.captcha_settle_ms)
    }

    pub fn captcha_dismiss(&self) -> Duration {
        Duration::from_millis(self.captcha_dismiss_ms)
    }

    pub fn captcha_refresh(&self) -> Duration {
        Duration::from_millis(self.captcha_refresh_ms)
    }
}

/// Everything the extraction strategies read from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Strategy the host uses when none is given explicitly.
    pub strategy: StrategyKind,
    pub column_types: ColumnTypes,
    pub grid_class: String,
    /// Folder for exported grid files. System temp dir when unset.
    pub tmp_folder: Option<PathBuf>,
    /// Folder for captcha screenshots. System temp dir when unset.
    pub captcha_dir: Option<PathBuf>,
    /// Regex matched against static text to detect a captcha dialog.
    pub captcha_title: String,
    /// Encoding label of exported files.
    pub export_encoding: String,
    /// Resolved grid handles kept per session; 0 disables caching.
    pub grid_cache_capacity: usize,
    pub timings: Timings,
}

impl Default for GridConfig {
    fn default() -> Self {
        let column_types = TEXT_COLUMNS
            .iter()
            .fold(ColumnTypes::auto(), |types, column| {
                types.with(*column, ColumnType::Str)
            });
        Self {
            strategy: StrategyKind::default(),
            column_types,
            grid_class: DEFAULT_GRID_CLASS.to_string(),
            tmp_folder: None,
            captcha_dir: None,
            captcha_title: DEFAULT_CAPTCHA_TITLE.to_string(),
            export_encoding: "gbk".to_string(),
            grid_cache_capacity: 8,
            timings: Timings::default(),
        }
    }
}

impl GridConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find and load the effective configuration, then apply env overrides.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path(explicit) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("GRIDTAP_TMP_DIR").filter(|d| !d.is_empty()) {
            self.tmp_folder = Some(PathBuf::from(dir));
        }
    }

    /// Check the fields that are only interpreted at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.captcha_pattern()?;
        self.encoding()?;
        Ok(())
    }

    pub fn captcha_pattern(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.captcha_title).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.captcha_title.clone(),
            source,
        })
    }

    pub fn encoding(&self) -> Result<&'static Encoding, ConfigError> {
        encoding_for_label(&self.export_encoding)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.tmp_folder.clone().unwrap_or_else(env::temp_dir)
    }

    pub fn captcha_dir(&self) -> PathBuf {
        self.captcha_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

/// Resolve a WHATWG encoding label such as `gbk` or `utf-8`.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, ConfigError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ConfigError::UnknownEncoding(label.to_string()))
}

/// Locate the config file, see the module docs for the priority order.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = env::var("GRIDTAP_CONFIG") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("gridtap").join("config.json"))
        .filter(|path| path.is_file())
}
