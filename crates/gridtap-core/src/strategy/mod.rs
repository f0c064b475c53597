//! Interchangeable ways of reading a grid.
//!
//! | Strategy | Trigger | Needs focus | Payload |
//! |----------|---------|-------------|---------|
//! | [`CopyStrategy::keystroke`] | `Ctrl+A Ctrl+C` to the grid | no | clipboard text |
//! | [`CopyStrategy::message`] | `WM_COMMAND` copy posted to the grid | no | clipboard text |
//! | [`ExportStrategy`] | `Ctrl+S` and the save dialog | yes | exported file |
//!
//! The clipboard strategies go through the captcha protocol and report
//! `Ok(None)` when nothing usable came back. The export strategy
//! propagates IO and decode failures.

mod copy;
mod export;

pub use copy::{CopyStrategy, CopyTrigger};
pub use export::ExportStrategy;

use serde::{Deserialize, Serialize};

use crate::bridge::UiBridge;
use crate::captcha::CaptchaRecognizer;
use crate::config::GridConfig;
use crate::error::GridError;
use crate::session::TraderSession;
use crate::table::RowSet;

/// Reads the rows of a grid control.
pub trait GridStrategy {
    fn name(&self) -> &'static str;

    /// Read the grid with the given control id.
    ///
    /// `Ok(None)` means the read did not succeed this time and the caller
    /// should retry at a higher level.
    fn get<B: UiBridge, R: CaptchaRecognizer>(
        &mut self,
        session: &mut TraderSession<B, R>,
        control_id: u32,
    ) -> Result<Option<RowSet>, GridError>;
}

/// Strategy names as they appear in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Copy,
    WmCopy,
    Xls,
}

/// One of the available strategies.
#[derive(Debug, Clone)]
pub enum Strategy {
    Copy(CopyStrategy),
    Export(ExportStrategy),
}

impl Strategy {
    pub fn clipboard_copy() -> Self {
        Strategy::Copy(CopyStrategy::keystroke())
    }

    pub fn message_copy() -> Self {
        Strategy::Copy(CopyStrategy::message())
    }

    pub fn file_export() -> Self {
        Strategy::Export(ExportStrategy::default())
    }

    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Copy => Self::clipboard_copy(),
            StrategyKind::WmCopy => Self::message_copy(),
            StrategyKind::Xls => Self::file_export(),
        }
    }

    /// The strategy selected by `config.strategy`.
    pub fn from_config(config: &GridConfig) -> Self {
        Self::from_kind(config.strategy)
    }
}

impl From<CopyStrategy> for Strategy {
    fn from(strategy: CopyStrategy) -> Self {
        Strategy::Copy(strategy)
    }
}

impl From<ExportStrategy> for Strategy {
    fn from(strategy: ExportStrategy) -> Self {
        Strategy::Export(strategy)
    }
}

impl GridStrategy for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Copy(s) => s.name(),
            Strategy::Export(s) => s.name(),
        }
    }

    fn get<B: UiBridge, R: CaptchaRecognizer>(
        &mut self,
        session: &mut TraderSession<B, R>,
        control_id: u32,
    ) -> Result<Option<RowSet>, GridError> {
        match self {
            Strategy::Copy(s) => s.get(session, control_id),
            Strategy::Export(s) => s.get(session, control_id),
        }
    }
}
