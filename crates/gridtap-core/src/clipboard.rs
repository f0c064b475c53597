//! Clipboard reads with retry.
//!
//! The clipboard is shared with every other process on the desktop and can
//! be locked for a moment by any of them.

use tracing::warn;

use crate::bridge::UiBridge;

/// Attempts before a clipboard read gives up.
pub const CLIPBOARD_ATTEMPTS: u32 = 5;

/// Read the clipboard, retrying failed reads up to `attempts` times.
///
/// Returns `None` once every attempt failed; the caller decides what an
/// unreadable clipboard means.
pub fn read_with_retry<B: UiBridge + ?Sized>(bridge: &mut B, attempts: u32) -> Option<String> {
    for attempt in 1..=attempts {
        match bridge.read_clipboard() {
            Ok(text) => return Some(text),
            Err(e) => warn!(attempt, attempts, error = %e, "clipboard read failed, retrying"),
        }
    }
    warn!(attempts, "clipboard unavailable, giving up");
    None
}
