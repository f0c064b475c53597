//! In-memory stand-ins for the desktop, used by unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use tempfile::TempDir;

use crate::bridge::{Handle, Locator, UiBridge};
use crate::captcha::CaptchaRecognizer;
use crate::clock::Clock;
use crate::config::{GridConfig, DEFAULT_GRID_CLASS};
use crate::error::BridgeError;
use crate::keys::KeySequence;
use crate::session::TraderSession;

/// Control id of the grid every scripted client shows.
pub const GRID_ID: u32 = 0x417;

pub const MAIN: Handle = Handle(1);
pub const CAPTCHA_DIALOG: Handle = Handle(2);
pub const SAVE_DIALOG: Handle = Handle(3);

const CAPTCHA_CONTROLS: &[(&str, u32, &str)] = &[
    ("Static", 0x965, ""),
    ("Edit", 0x964, ""),
    ("Static", 0x966, "验证码错误"),
    ("Static", 0x967, "请输入验证码"),
    ("Button", 1, "确定"),
    ("Button", 2, "取消"),
];

const SAVE_CONTROLS: &[(&str, u32, &str)] = &[
    ("Edit", 0x47c, ""),
    ("Button", 1, "保存(S)"),
    ("Button", 2, "取消"),
];

/// Something the code under test did to the desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Keys {
        target: Handle,
        keys: String,
        set_foreground: bool,
    },
    Post {
        target: Handle,
        message: u32,
        wparam: usize,
        lparam: isize,
    },
    SetText(Handle, String),
    Click(Handle),
    Capture(Handle),
    Foreground(Handle),
    Restore(Handle),
    Focus(Handle),
}

/// A trading client driven by a script instead of a real window.
#[derive(Debug)]
pub struct ScriptedBridge {
    pub grids: Vec<u32>,
    pub clipboard: VecDeque<Result<String, BridgeError>>,
    pub clipboard_reads: u32,
    /// A captcha dialog is open.
    pub challenge: bool,
    /// Submissions needed before the captcha dialog closes; `None` never.
    pub closes_after: Option<u32>,
    pub submissions: u32,
    pub probes: u32,
    /// The save dialog shows up on this popup check.
    pub pop_dialog_after: Option<u32>,
    pub pop_checks: u32,
    save_dialog_open: bool,
    save_path: Option<PathBuf>,
    saved: bool,
    /// An overwrite confirmation stays up after saving.
    pub leftover_popup: bool,
    /// Bytes the client writes when the save dialog is confirmed.
    pub export_bytes: Option<Vec<u8>>,
    pub minimized: bool,
    pub foreground_fails: bool,
    pub dead: Vec<Handle>,
    pub grid_lookups: u32,
    pub events: Vec<Event>,
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self {
            grids: vec![GRID_ID],
            clipboard: VecDeque::new(),
            clipboard_reads: 0,
            challenge: false,
            closes_after: None,
            submissions: 0,
            probes: 0,
            pop_dialog_after: None,
            pop_checks: 0,
            save_dialog_open: false,
            save_path: None,
            saved: false,
            leftover_popup: false,
            export_bytes: None,
            minimized: false,
            foreground_fails: false,
            dead: Vec::new(),
            grid_lookups: 0,
            events: Vec::new(),
        }
    }

    pub fn with_clipboard(mut self, reads: Vec<Result<String, BridgeError>>) -> Self {
        self.clipboard = reads.into();
        self
    }

    pub fn with_challenge(mut self, closes_after: Option<u32>) -> Self {
        self.challenge = true;
        self.closes_after = closes_after;
        self
    }

    /// Show the save dialog on the `appears_on`-th popup check and write
    /// `content` (GBK) when it is confirmed.
    pub fn with_export(mut self, appears_on: u32, content: &str) -> Self {
        let (bytes, _, _) = encoding_rs::GBK.encode(content);
        self.pop_dialog_after = Some(appears_on);
        self.export_bytes = Some(bytes.into_owned());
        self
    }

    pub fn grid_handle(control_id: u32) -> Handle {
        Handle(0x1_0000 | u64::from(control_id))
    }

    pub fn dialog_control(_class_name: &str, control_id: u32) -> Handle {
        Self::child_handle(CAPTCHA_DIALOG, control_id)
    }

    pub fn save_control(control_id: u32) -> Handle {
        Self::child_handle(SAVE_DIALOG, control_id)
    }

    fn child_handle(parent: Handle, control_id: u32) -> Handle {
        Handle((parent.0 << 16) | u64::from(control_id))
    }

    pub fn clicks_on(&self, handle: Handle) -> usize {
        self.events
            .iter()
            .filter(|e| **e == Event::Click(handle))
            .count()
    }

    pub fn keys_sent(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Keys { keys, .. } => Some(keys.as_str()),
                _ => None,
            })
            .collect()
    }

    fn controls(&self, parent: Handle) -> &'static [(&'static str, u32, &'static str)] {
        match parent {
            CAPTCHA_DIALOG if self.challenge => CAPTCHA_CONTROLS,
            SAVE_DIALOG if self.save_visible() => SAVE_CONTROLS,
            _ => &[],
        }
    }

    fn save_visible(&self) -> bool {
        (self.save_dialog_open && !self.saved) || (self.saved && self.leftover_popup)
    }
}

impl Default for ScriptedBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl UiBridge for ScriptedBridge {
    fn main_window(&mut self) -> Result<Handle, BridgeError> {
        Ok(MAIN)
    }

    fn top_window(&mut self) -> Result<Handle, BridgeError> {
        Ok(if self.challenge {
            CAPTCHA_DIALOG
        } else if self.save_visible() {
            SAVE_DIALOG
        } else {
            MAIN
        })
    }

    fn find(&mut self, parent: Handle, locator: &Locator) -> Result<Handle, BridgeError> {
        if parent == MAIN {
            self.grid_lookups += 1;
            return match locator.control_id {
                Some(id)
                    if self.grids.contains(&id)
                        && locator.class_name.as_deref() == Some(DEFAULT_GRID_CLASS) =>
                {
                    Ok(Self::grid_handle(id))
                }
                _ => Err(BridgeError::NotFound(locator.to_string())),
            };
        }

        let matches: Vec<_> = self
            .controls(parent)
            .iter()
            .filter(|(class, id, title)| locator.matches(class, *id, title))
            .collect();
        let picked = match locator.index {
            Some(n) => n.checked_sub(1).and_then(|i| matches.get(i)),
            None => matches.first(),
        };
        picked
            .map(|(_, id, _)| Self::child_handle(parent, *id))
            .ok_or_else(|| BridgeError::NotFound(locator.to_string()))
    }

    fn exists(&mut self, parent: Handle, locator: &Locator, _timeout: Duration) -> bool {
        self.probes += 1;
        self.controls(parent)
            .iter()
            .any(|(class, id, title)| locator.matches(class, *id, title))
    }

    fn is_alive(&mut self, handle: Handle) -> bool {
        !self.dead.contains(&handle)
    }

    fn send_keys(
        &mut self,
        target: Handle,
        keys: &KeySequence,
        set_foreground: bool,
    ) -> Result<(), BridgeError> {
        let keys = keys.to_send_keys();
        if target == CAPTCHA_DIALOG && self.challenge && keys == "{ENTER}" {
            self.submissions += 1;
        }
        if target == SAVE_DIALOG && self.save_visible() && !self.saved && keys == "%s%y" {
            if let (Some(path), Some(bytes)) = (&self.save_path, &self.export_bytes) {
                std::fs::write(path, bytes).map_err(|e| BridgeError::Failed(e.to_string()))?;
            }
            self.saved = true;
        }
        self.events.push(Event::Keys {
            target,
            keys,
            set_foreground,
        });
        Ok(())
    }

    fn post_message(
        &mut self,
        target: Handle,
        message: u32,
        wparam: usize,
        lparam: isize,
    ) -> Result<(), BridgeError> {
        self.events.push(Event::Post {
            target,
            message,
            wparam,
            lparam,
        });
        Ok(())
    }

    fn read_clipboard(&mut self) -> Result<String, BridgeError> {
        self.clipboard_reads += 1;
        self.clipboard
            .pop_front()
            .unwrap_or_else(|| Err(BridgeError::Busy("clipboard locked".into())))
    }

    fn set_text(&mut self, control: Handle, text: &str) -> Result<(), BridgeError> {
        if control == Self::save_control(0x47c) {
            self.save_path = Some(PathBuf::from(text));
        }
        self.events.push(Event::SetText(control, text.to_string()));
        Ok(())
    }

    fn window_text(&mut self, control: Handle) -> Result<String, BridgeError> {
        CAPTCHA_CONTROLS
            .iter()
            .find(|(_, id, _)| Self::child_handle(CAPTCHA_DIALOG, *id) == control)
            .map(|(_, _, title)| title.to_string())
            .ok_or_else(|| BridgeError::NotFound(control.to_string()))
    }

    fn click(&mut self, control: Handle) -> Result<(), BridgeError> {
        if control == Self::child_handle(CAPTCHA_DIALOG, 2) {
            self.challenge = false;
        }
        if control == Self::save_control(2) && self.saved {
            self.leftover_popup = false;
        }
        self.events.push(Event::Click(control));
        Ok(())
    }

    fn capture_image(&mut self, control: Handle) -> Result<Vec<u8>, BridgeError> {
        self.events.push(Event::Capture(control));
        Ok(b"\x89PNG\r\n\x1a\nscripted".to_vec())
    }

    fn wait_gone(&mut self, window: Handle, _timeout: Duration) -> bool {
        if window != CAPTCHA_DIALOG || !self.challenge {
            return true;
        }
        if self.closes_after.is_some_and(|n| self.submissions >= n) {
            self.challenge = false;
            return true;
        }
        false
    }

    fn is_minimized(&mut self, _window: Handle) -> Result<bool, BridgeError> {
        Ok(self.minimized)
    }

    fn restore(&mut self, window: Handle) -> Result<(), BridgeError> {
        if self.foreground_fails {
            return Err(BridgeError::Failed("restore refused".into()));
        }
        self.events.push(Event::Restore(window));
        Ok(())
    }

    fn set_foreground(&mut self, window: Handle) -> Result<(), BridgeError> {
        if self.foreground_fails {
            return Err(BridgeError::Failed("SetForegroundWindow refused".into()));
        }
        self.events.push(Event::Foreground(window));
        Ok(())
    }

    fn set_focus(&mut self, window: Handle) -> Result<(), BridgeError> {
        self.events.push(Event::Focus(window));
        Ok(())
    }

    fn has_pop_dialog(&mut self) -> bool {
        self.pop_checks += 1;
        if self.saved {
            return self.leftover_popup;
        }
        if self.pop_dialog_after.is_some_and(|n| self.pop_checks >= n) {
            self.save_dialog_open = true;
        }
        self.save_dialog_open
    }
}

/// Returns scripted answers in order, repeating the last one.
#[derive(Debug, Default)]
pub struct ScriptedRecognizer {
    answers: Vec<String>,
    pub calls: Vec<PathBuf>,
    pub fail: bool,
}

impl ScriptedRecognizer {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            calls: Vec::new(),
            fail: false,
        }
    }
}

impl CaptchaRecognizer for ScriptedRecognizer {
    fn recognize(&mut self, image: &Path) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.calls.push(image.to_path_buf());
        if self.fail {
            return Err("recognizer crashed".into());
        }
        let i = (self.calls.len() - 1).min(self.answers.len().saturating_sub(1));
        Ok(self.answers.get(i).cloned().unwrap_or_default())
    }
}

/// Records sleeps instead of blocking.
#[derive(Debug, Default, Clone)]
pub struct RecordingClock {
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for RecordingClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// A session over `bridge` with temp folders in a fresh directory and a
/// recording clock. Keep the returned directory alive for the test.
pub fn session(bridge: ScriptedBridge) -> (TraderSession<ScriptedBridge, ScriptedRecognizer>, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = GridConfig {
        tmp_folder: Some(dir.path().to_path_buf()),
        captcha_dir: Some(dir.path().to_path_buf()),
        ..GridConfig::default()
    };
    let session = TraderSession::new(bridge, ScriptedRecognizer::new(&[]), config)
        .expect("default config is valid")
        .with_clock(RecordingClock::default());
    (session, dir)
}
