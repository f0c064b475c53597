//! Save-dialog export of a grid to a temporary file.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::GridStrategy;
use crate::bridge::{Handle, Locator, UiBridge};
use crate::captcha::CaptchaRecognizer;
use crate::error::GridError;
use crate::keys::KeySequence;
use crate::session::TraderSession;
use crate::table::{decode_file, RowSet};

const SAVE: &str = "Ctrl+S";
/// Save, then confirm overwriting an existing file.
const CONFIRM_SAVE: &str = "Alt+S Alt+Y";

/// Export the grid through the client's save dialog and decode the file.
///
/// Needs real window focus. Files are left behind in the export folder.
#[derive(Debug, Clone, Default)]
pub struct ExportStrategy {
    tmp_folder: Option<PathBuf>,
}

impl ExportStrategy {
    /// Export into `tmp_folder`, or the configured export folder when `None`.
    pub fn new(tmp_folder: Option<PathBuf>) -> Self {
        Self { tmp_folder }
    }

    pub fn tmp_folder(&self) -> Option<&Path> {
        self.tmp_folder.as_deref()
    }

    fn export_path<B: UiBridge, R: CaptchaRecognizer>(
        &self,
        session: &TraderSession<B, R>,
    ) -> PathBuf {
        let dir = self
            .tmp_folder
            .clone()
            .unwrap_or_else(|| session.config.export_dir());
        dir.join(format!("{}.xls", Uuid::new_v4().simple()))
    }

    /// Poll for the save dialog. Returns whether it showed up.
    fn await_save_dialog<B: UiBridge, R: CaptchaRecognizer>(
        session: &mut TraderSession<B, R>,
    ) -> bool {
        let timings = session.config.timings;
        for attempt in 1..=timings.save_dialog_attempts {
            if session.bridge.has_pop_dialog() {
                debug!(attempt, "save dialog is up");
                return true;
            }
            session.wait(timings.save_dialog_poll());
        }
        warn!(
            attempts = timings.save_dialog_attempts,
            "save dialog never appeared"
        );
        false
    }

    fn fill_path<B: UiBridge, R: CaptchaRecognizer>(
        session: &mut TraderSession<B, R>,
        dialog: Handle,
        path: &Path,
    ) -> Result<(), GridError> {
        let edit = session.bridge.find(dialog, &Locator::nth("Edit", 1))?;
        session
            .bridge
            .set_text(edit, &path.to_string_lossy())?;
        Ok(())
    }

    fn confirm<B: UiBridge, R: CaptchaRecognizer>(
        session: &mut TraderSession<B, R>,
        dialog: Handle,
    ) -> Result<(), GridError> {
        let keys = KeySequence::parse(CONFIRM_SAVE)?;
        session.bridge.send_keys(dialog, &keys, false)?;
        Ok(())
    }

    /// Close an overwrite confirmation or other popup left after saving.
    fn dismiss_leftover<B: UiBridge, R: CaptchaRecognizer>(
        session: &mut TraderSession<B, R>,
    ) -> Result<(), GridError> {
        let top = session.bridge.top_window()?;
        let button = session.bridge.find(top, &Locator::nth("Button", 2))?;
        session.bridge.click(button)?;
        session.wait(session.config.timings.popup_dismiss());
        Ok(())
    }
}

impl GridStrategy for ExportStrategy {
    fn name(&self) -> &'static str {
        "xls"
    }

    fn get<B: UiBridge, R: CaptchaRecognizer>(
        &mut self,
        session: &mut TraderSession<B, R>,
        control_id: u32,
    ) -> Result<Option<RowSet>, GridError> {
        let grid = session.grid(control_id)?;
        session.foreground(grid);
        let save = KeySequence::parse(SAVE)?;
        if let Err(e) = session.bridge.send_keys(grid, &save, false) {
            warn!(control_id, error = %e, "save shortcut was not delivered");
        }
        Self::await_save_dialog(session);

        let path = self.export_path(session);
        match session.bridge.top_window() {
            Ok(dialog) => {
                session.foreground(dialog);
                if let Err(e) = Self::fill_path(session, dialog, &path) {
                    warn!(error = %e, path = %path.display(), "could not enter export path");
                }
                session.wait(session.config.timings.save_path_settle());
                if let Err(e) = Self::confirm(session, dialog) {
                    warn!(error = %e, "could not confirm save dialog");
                }
            }
            Err(e) => {
                warn!(error = %e, "no top window to save from");
                session.wait(session.config.timings.save_path_settle());
            }
        }
        session.wait(session.config.timings.export_settle());

        if session.bridge.has_pop_dialog() {
            if let Err(e) = Self::dismiss_leftover(session) {
                warn!(error = %e, "could not dismiss popup after saving");
            }
        }

        debug!(path = %path.display(), "decoding exported grid");
        let types = session.config.column_types.clone();
        decode_file(&path, &types, session.export_encoding).map(Some)
    }
}
