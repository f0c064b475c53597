//! Captcha verification around clipboard reads.
//!
//! The client can pop up an image challenge when its grid is copied. The
//! protocol below detects the dialog, screenshots the image, asks an
//! external recognizer for the text and submits it, refreshing the image
//! after every failed attempt. After [`MAX_ATTEMPTS`] failures the dialog
//! is cancelled.
//!
//! ```text
//! NoChallenge ──detect──▶ ChallengeDetected ──4 chars──▶ Answering ──gone──▶ Resolved
//!                               ▲                            │
//!                               └──────── refresh ◀──────────┘
//!                         (5 attempts exhausted) ──▶ Cancelled
//! ```

use std::error::Error;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bridge::{Handle, Locator, UiBridge};
use crate::error::GridError;
use crate::keys::KeySequence;
use crate::session::TraderSession;

/// Control id of the challenge image.
pub const CAPTCHA_IMAGE_ID: u32 = 0x965;
/// Control id of the answer field.
pub const CAPTCHA_INPUT_ID: u32 = 0x964;
/// Control id of the feedback text shown after a wrong answer.
pub const CAPTCHA_FEEDBACK_ID: u32 = 0x966;
/// Length of a well-formed answer.
pub const ANSWER_LEN: usize = 4;
pub const MAX_ATTEMPTS: u32 = 5;

/// External image-to-text recognizer.
pub trait CaptchaRecognizer {
    fn recognize(&mut self, image: &Path) -> Result<String, Box<dyn Error + Send + Sync>>;
}

impl<F> CaptchaRecognizer for F
where
    F: FnMut(&Path) -> Result<String, Box<dyn Error + Send + Sync>>,
{
    fn recognize(&mut self, image: &Path) -> Result<String, Box<dyn Error + Send + Sync>> {
        self(image)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaState {
    NoChallenge,
    ChallengeDetected,
    Answering,
    Resolved,
    Cancelled,
}

/// Outcome of one pass through the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptchaReport {
    pub state: CaptchaState,
    /// Images captured and handed to the recognizer.
    pub captures: u32,
    /// Well-formed answers submitted to the dialog.
    pub submissions: u32,
    /// Clicks on the image to get a new challenge.
    pub refreshes: u32,
}

impl CaptchaReport {
    fn new() -> Self {
        Self {
            state: CaptchaState::NoChallenge,
            captures: 0,
            submissions: 0,
            refreshes: 0,
        }
    }

    /// Whether the clipboard is safe to read (no dialog left open by us).
    pub fn is_clear(&self) -> bool {
        matches!(
            self.state,
            CaptchaState::NoChallenge | CaptchaState::Resolved
        )
    }
}

/// Strip every whitespace character from a recognizer answer.
fn clean_answer(raw: &str) -> String {
    raw.split_whitespace().collect()
}

/// Detect and answer a captcha dialog on the client's top window.
///
/// Recognizer failures and failures to capture the image propagate.
/// Refresh clicks, feedback reads and the final cancel are best effort.
pub fn clear_challenge<B: UiBridge, R: CaptchaRecognizer>(
    session: &mut TraderSession<B, R>,
) -> Result<CaptchaReport, GridError> {
    let mut report = CaptchaReport::new();
    let timings = session.config.timings;

    let dialog = match session.bridge.top_window() {
        Ok(dialog) => dialog,
        Err(e) => {
            debug!(error = %e, "no top window to probe for a captcha");
            return Ok(report);
        }
    };

    let marker = Locator::titled("Static", session.captcha_title.clone());
    if !session
        .bridge
        .exists(dialog, &marker, timings.captcha_probe())
    {
        return Ok(report);
    }

    report.state = CaptchaState::ChallengeDetected;
    info!(%dialog, "captcha challenge detected");
    session.wait(timings.captcha_settle());

    let image = Locator::by_id(CAPTCHA_IMAGE_ID, "Static");
    let dir = session.captcha_dir();
    std::fs::create_dir_all(&dir).map_err(|source| GridError::io(&dir, source))?;

    let mut remaining = MAX_ATTEMPTS;
    while remaining > 0 {
        let path = dir.join(format!("tmp-{}.png", remaining));
        let control = session.bridge.find(dialog, &image)?;
        let png = session.bridge.capture_image(control)?;
        std::fs::write(&path, png).map_err(|source| GridError::io(&path, source))?;
        report.captures += 1;

        let raw = session
            .recognizer
            .recognize(&path)
            .map_err(GridError::Recognizer)?;
        let answer = clean_answer(&raw);
        info!(answer = %answer, file = %path.display(), "captcha recognized");

        if answer.chars().count() == ANSWER_LEN {
            report.state = CaptchaState::Answering;
            report.submissions += 1;
            if submit_answer(session, dialog, &answer)? {
                report.state = CaptchaState::Resolved;
                info!(attempts = report.captures, "captcha accepted");
                return Ok(report);
            }
            log_feedback(session, dialog);
        } else {
            debug!(
                len = answer.chars().count(),
                "answer has the wrong length, requesting a new image"
            );
            report.state = CaptchaState::ChallengeDetected;
        }

        remaining -= 1;
        if let Err(e) = session
            .bridge
            .find(dialog, &image)
            .and_then(|control| session.bridge.click(control))
        {
            warn!(error = %e, "could not refresh captcha image");
        }
        report.refreshes += 1;
        session.wait(timings.captcha_refresh());
    }

    report.state = CaptchaState::Cancelled;
    if let Err(e) = session
        .bridge
        .find(dialog, &Locator::nth("Button", 2))
        .and_then(|cancel| session.bridge.click(cancel))
    {
        warn!(error = %e, "could not cancel captcha dialog");
    }
    warn!(attempts = MAX_ATTEMPTS, "captcha unresolved, dialog cancelled");
    Ok(report)
}

/// Type the answer, confirm, and report whether the dialog went away.
fn submit_answer<B: UiBridge, R: CaptchaRecognizer>(
    session: &mut TraderSession<B, R>,
    dialog: Handle,
    answer: &str,
) -> Result<bool, GridError> {
    let editor = session
        .bridge
        .find(dialog, &Locator::by_id(CAPTCHA_INPUT_ID, "Edit"))?;
    session.bridge.set_text(editor, answer)?;

    if let Err(e) = session.bridge.set_focus(dialog) {
        warn!(error = %e, "could not focus captcha dialog");
    }
    let enter = KeySequence::parse("Enter")?;
    session.bridge.send_keys(dialog, &enter, false)?;

    let timeout = session.config.timings.captcha_dismiss();
    Ok(session.bridge.wait_gone(dialog, timeout))
}

fn log_feedback<B: UiBridge, R: CaptchaRecognizer>(
    session: &mut TraderSession<B, R>,
    dialog: Handle,
) {
    let feedback = session
        .bridge
        .find(dialog, &Locator::by_id(CAPTCHA_FEEDBACK_ID, "Static"))
        .and_then(|control| session.bridge.window_text(control));
    match feedback {
        Ok(text) => info!(feedback = %text, "captcha dialog still open"),
        Err(e) => debug!(error = %e, "captcha dialog still open, no feedback text"),
    }
}
