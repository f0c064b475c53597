//! Clipboard-based grid reads.

use tracing::{debug, warn};

use super::GridStrategy;
use crate::bridge::{Handle, UiBridge, GRID_COPY_COMMAND, WM_COMMAND};
use crate::captcha::{self, CaptchaRecognizer};
use crate::clipboard::{self, CLIPBOARD_ATTEMPTS};
use crate::error::GridError;
use crate::keys::KeySequence;
use crate::session::TraderSession;
use crate::table::{decode_text, RowSet};

const SELECT_ALL_COPY: &str = "Ctrl+A Ctrl+C";

/// How the grid is told to copy itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTrigger {
    /// Type `Ctrl+A Ctrl+C` into the grid without raising the window.
    Keystroke,
    /// Post the grid's copy command straight to its message queue.
    Message,
}

/// Copy the grid to the clipboard and decode it.
#[derive(Debug, Clone)]
pub struct CopyStrategy {
    trigger: CopyTrigger,
    /// Probe for a captcha before reading the clipboard. Starts set and is
    /// set again whenever a payload fails to decode; nothing clears it
    /// except [`CopyStrategy::set_captcha_seen_recently`].
    captcha_seen_recently: bool,
}

impl CopyStrategy {
    pub fn new(trigger: CopyTrigger) -> Self {
        Self {
            trigger,
            captcha_seen_recently: true,
        }
    }

    pub fn keystroke() -> Self {
        Self::new(CopyTrigger::Keystroke)
    }

    pub fn message() -> Self {
        Self::new(CopyTrigger::Message)
    }

    pub fn trigger(&self) -> CopyTrigger {
        self.trigger
    }

    pub fn captcha_seen_recently(&self) -> bool {
        self.captcha_seen_recently
    }

    pub fn set_captcha_seen_recently(&mut self, seen: bool) {
        self.captcha_seen_recently = seen;
    }

    fn send_copy<B: UiBridge, R: CaptchaRecognizer>(
        &self,
        session: &mut TraderSession<B, R>,
        grid: Handle,
    ) -> Result<(), GridError> {
        match self.trigger {
            CopyTrigger::Keystroke => {
                let keys = KeySequence::parse(SELECT_ALL_COPY)?;
                session.bridge.send_keys(grid, &keys, false)?;
            }
            CopyTrigger::Message => {
                session
                    .bridge
                    .post_message(grid, WM_COMMAND, GRID_COPY_COMMAND, 0)?;
                session.wait(session.config.timings.message_settle());
            }
        }
        Ok(())
    }

    /// Read the clipboard, clearing a captcha dialog first if one may be up.
    fn read_payload<B: UiBridge, R: CaptchaRecognizer>(
        &self,
        session: &mut TraderSession<B, R>,
    ) -> Result<Option<String>, GridError> {
        if self.captcha_seen_recently {
            let report = captcha::clear_challenge(session)?;
            debug!(?report, "captcha gate passed");
        }
        Ok(clipboard::read_with_retry(
            &mut session.bridge,
            CLIPBOARD_ATTEMPTS,
        ))
    }

    // A payload that does not decode is most often a captcha dialog's text
    // instead of the grid, so a failure re-arms the captcha probe.
    fn decode<B: UiBridge, R: CaptchaRecognizer>(
        &mut self,
        session: &TraderSession<B, R>,
        payload: Option<String>,
    ) -> Option<RowSet> {
        let Some(text) = payload else {
            warn!("clipboard was unreadable, will probe for a captcha next time");
            self.captcha_seen_recently = true;
            return None;
        };
        match decode_text(&text, &session.config.column_types) {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(error = %e, "clipboard payload did not decode, will probe for a captcha next time");
                self.captcha_seen_recently = true;
                None
            }
        }
    }
}

impl GridStrategy for CopyStrategy {
    fn name(&self) -> &'static str {
        match self.trigger {
            CopyTrigger::Keystroke => "copy",
            CopyTrigger::Message => "wm_copy",
        }
    }

    fn get<B: UiBridge, R: CaptchaRecognizer>(
        &mut self,
        session: &mut TraderSession<B, R>,
        control_id: u32,
    ) -> Result<Option<RowSet>, GridError> {
        let grid = session.grid(control_id)?;
        if let Err(e) = self.send_copy(session, grid) {
            warn!(control_id, error = %e, "copy trigger failed");
            return Ok(None);
        }
        let payload = self.read_payload(session)?;
        Ok(self.decode(session, payload))
    }
}
