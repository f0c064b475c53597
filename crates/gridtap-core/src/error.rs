//! Error types with operator-facing suggestions.
//!
//! Library code returns [`GridError`]; the CLI turns it into an
//! [`ErrorReport`] so every failure carries a stable code and a hint.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::table::DecodeError;

/// Failure reported by a [`UiBridge`](crate::bridge::UiBridge) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// No control matched the locator.
    #[error("control not found: {0}")]
    NotFound(String),
    /// A shared OS resource (clipboard, input queue) is held by someone else.
    #[error("resource busy: {0}")]
    Busy(String),
    /// Any other failure of the automation layer.
    #[error("{0}")]
    Failed(String),
}

/// Errors surfaced by grid extraction.
#[derive(Debug, Error)]
pub enum GridError {
    /// Focus, lookup or clipboard failure in the UI layer.
    #[error("transient UI failure: {0}")]
    TransientUi(#[from] BridgeError),

    /// The payload could not be parsed into rows.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// A file could not be read or written.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external captcha recognizer failed.
    #[error("captcha recognizer failed: {0}")]
    Recognizer(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid key sequence '{0}'")]
    InvalidKeys(String),

    /// `get` was called before a trader session was bound.
    #[error("no trader session bound")]
    Unbound,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GridError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            GridError::TransientUi(_) => ErrorCode::TransientUi,
            GridError::Decode(_) => ErrorCode::DecodeFailed,
            GridError::Io { .. } => ErrorCode::IoFailed,
            GridError::Recognizer(_) => ErrorCode::RecognizerFailed,
            GridError::InvalidKeys(_) => ErrorCode::InvalidInput,
            GridError::Unbound => ErrorCode::NotBound,
            GridError::Config(_) => ErrorCode::InvalidConfig,
        }
    }

    /// What an operator can try next.
    pub fn suggestion(&self) -> String {
        match self {
            GridError::TransientUi(BridgeError::NotFound(_)) => {
                "Check the grid control id and that the trading client shows the expected page"
                    .into()
            }
            GridError::TransientUi(_) => {
                "The trading client was busy or lost focus. Retry the query.".into()
            }
            GridError::Decode(_) => {
                "The grid payload was not tab-delimited as expected. Check the column types in the config or try the file export strategy."
                    .into()
            }
            GridError::Io { .. } => {
                "Check that the export folder exists and is writable, and that the save dialog accepted the path."
                    .into()
            }
            GridError::Recognizer(_) => {
                "Check the captcha recognizer installation; the dialog may need manual input."
                    .into()
            }
            GridError::InvalidKeys(_) => {
                "Use space-separated keys such as 'Ctrl+A Ctrl+C', 'Alt+S' or 'Enter'".into()
            }
            GridError::Unbound => "Call set_trader with a live session before reading grids".into(),
            GridError::Config(_) => {
                "Fix the configuration file, or run 'gridtap config' to see the effective values"
                    .into()
            }
        }
    }
}

/// Error codes for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TransientUi,
    DecodeFailed,
    IoFailed,
    RecognizerFailed,
    InvalidInput,
    NotBound,
    InvalidConfig,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::TransientUi => write!(f, "TRANSIENT_UI"),
            ErrorCode::DecodeFailed => write!(f, "DECODE_FAILED"),
            ErrorCode::IoFailed => write!(f, "IO_FAILED"),
            ErrorCode::RecognizerFailed => write!(f, "RECOGNIZER_FAILED"),
            ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorCode::NotBound => write!(f, "NOT_BOUND"),
            ErrorCode::InvalidConfig => write!(f, "INVALID_CONFIG"),
        }
    }
}

/// Serializable form of a [`GridError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl From<&GridError> for ErrorReport {
    fn from(err: &GridError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            suggestion: Some(err.suggestion()),
        }
    }
}
