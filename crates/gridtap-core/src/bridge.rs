//! Downward interface to the UI automation layer.
//!
//! gridtap never talks to windows directly. Everything it needs from the
//! desktop (finding controls, sending keys, the clipboard, screenshots of a
//! control) goes through [`UiBridge`], so the extraction logic can run
//! against a scripted bridge in tests.

use std::fmt;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::keys::KeySequence;

/// `WM_COMMAND` window message.
pub const WM_COMMAND: u32 = 0x0111;

/// Command id the grid control handles as "copy all rows".
pub const GRID_COPY_COMMAND: usize = 0xE122;

/// Opaque reference to a window or control owned by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(pub u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// How to find a control below a parent window.
///
/// Every set field must match. `index` picks the n-th (1-based) control of
/// the class among the matches, the way `Edit1` or `Button2` are addressed.
#[derive(Debug, Clone, Default)]
pub struct Locator {
    pub class_name: Option<String>,
    pub control_id: Option<u32>,
    pub title: Option<Regex>,
    pub index: Option<usize>,
}

impl Locator {
    pub fn by_id(control_id: u32, class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            control_id: Some(control_id),
            ..Self::default()
        }
    }

    pub fn titled(class_name: impl Into<String>, title: Regex) -> Self {
        Self {
            class_name: Some(class_name.into()),
            title: Some(title),
            ..Self::default()
        }
    }

    /// The `index`-th control of a class, counting from 1.
    pub fn nth(class_name: impl Into<String>, index: usize) -> Self {
        Self {
            class_name: Some(class_name.into()),
            index: Some(index),
            ..Self::default()
        }
    }

    /// Whether a control's attributes satisfy this locator. `index` is not
    /// checked here; bridges apply it to the ordered list of matches.
    pub fn matches(&self, class_name: &str, control_id: u32, title: &str) -> bool {
        self.class_name.as_deref().map_or(true, |c| c == class_name)
            && self.control_id.map_or(true, |id| id == control_id)
            && self.title.as_ref().map_or(true, |re| re.is_match(title))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_name.as_deref().unwrap_or("*"))?;
        if let Some(index) = self.index {
            write!(f, "{}", index)?;
        }
        if let Some(id) = self.control_id {
            write!(f, "#{:#x}", id)?;
        }
        if let Some(title) = &self.title {
            write!(f, " /{}/", title.as_str())?;
        }
        Ok(())
    }
}

/// Capabilities gridtap needs from the desktop automation layer.
///
/// Implementations wrap a live application session. Calls are made from a
/// single thread, one at a time.
pub trait UiBridge {
    /// The trading client's main window.
    fn main_window(&mut self) -> Result<Handle, BridgeError>;

    /// The application's current top-level window (a dialog when one is open).
    fn top_window(&mut self) -> Result<Handle, BridgeError>;

    /// Resolve a child control.
    fn find(&mut self, parent: Handle, locator: &Locator) -> Result<Handle, BridgeError>;

    /// Whether a matching child appears within `timeout`.
    fn exists(&mut self, parent: Handle, locator: &Locator, timeout: Duration) -> bool;

    /// Whether a previously resolved handle still refers to a live control.
    fn is_alive(&mut self, handle: Handle) -> bool;

    /// Type keys into a window. `set_foreground` asks the bridge to raise the
    /// window first.
    fn send_keys(
        &mut self,
        target: Handle,
        keys: &KeySequence,
        set_foreground: bool,
    ) -> Result<(), BridgeError>;

    /// Post a raw message to a control's queue without waiting for it.
    fn post_message(
        &mut self,
        target: Handle,
        message: u32,
        wparam: usize,
        lparam: isize,
    ) -> Result<(), BridgeError>;

    fn read_clipboard(&mut self) -> Result<String, BridgeError>;

    /// Replace the text of an edit control.
    fn set_text(&mut self, control: Handle, text: &str) -> Result<(), BridgeError>;

    fn window_text(&mut self, control: Handle) -> Result<String, BridgeError>;

    fn click(&mut self, control: Handle) -> Result<(), BridgeError>;

    /// Capture a control as PNG bytes.
    fn capture_image(&mut self, control: Handle) -> Result<Vec<u8>, BridgeError>;

    /// Wait until `window` no longer exists. Returns `false` on timeout.
    fn wait_gone(&mut self, window: Handle, timeout: Duration) -> bool;

    fn is_minimized(&mut self, window: Handle) -> Result<bool, BridgeError>;

    /// Restore a minimized window.
    fn restore(&mut self, window: Handle) -> Result<(), BridgeError>;

    fn set_foreground(&mut self, window: Handle) -> Result<(), BridgeError>;

    fn set_focus(&mut self, window: Handle) -> Result<(), BridgeError>;

    /// Whether the client currently shows a popup dialog over the main window.
    fn has_pop_dialog(&mut self) -> bool;
}
