//! A live trading-client session as seen by the extraction strategies.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use encoding_rs::Encoding;
use regex::Regex;
use tracing::{debug, warn};

use crate::bridge::{Handle, Locator, UiBridge};
use crate::captcha::CaptchaRecognizer;
use crate::clock::{Clock, SystemClock};
use crate::config::GridConfig;
use crate::error::{BridgeError, GridError};

/// Result of a best-effort foreground request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Foreground {
    /// The window was raised.
    Raised,
    /// The window was minimized and has been restored.
    Restored,
    /// The bridge refused; the caller carries on regardless.
    Failed(BridgeError),
}

/// Resolved grid handles keyed by (control id, class), oldest evicted first.
#[derive(Debug, Default)]
struct GridCache {
    capacity: usize,
    entries: VecDeque<((u32, String), Handle)>,
}

impl GridCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    fn get(&self, control_id: u32, class_name: &str) -> Option<Handle> {
        self.entries
            .iter()
            .find(|((id, class), _)| *id == control_id && class == class_name)
            .map(|(_, handle)| *handle)
    }

    fn insert(&mut self, control_id: u32, class_name: &str, handle: Handle) {
        if self.capacity == 0 {
            return;
        }
        self.remove(control_id, class_name);
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries
            .push_back(((control_id, class_name.to_string()), handle));
    }

    fn remove(&mut self, control_id: u32, class_name: &str) {
        self.entries
            .retain(|((id, class), _)| !(*id == control_id && class == class_name));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Bridge, recognizer, clock and configuration for one client session.
///
/// Calls must be serialized: the grid, the clipboard and the temp folders
/// are shared by everything running against the same client.
pub struct TraderSession<B, R> {
    pub(crate) bridge: B,
    pub(crate) recognizer: R,
    clock: Box<dyn Clock>,
    pub(crate) config: GridConfig,
    pub(crate) captcha_title: Regex,
    pub(crate) export_encoding: &'static Encoding,
    grid_cache: GridCache,
}

impl<B: UiBridge, R: CaptchaRecognizer> TraderSession<B, R> {
    /// Create a session using the system clock.
    pub fn new(bridge: B, recognizer: R, config: GridConfig) -> Result<Self, GridError> {
        let captcha_title = config.captcha_pattern()?;
        let export_encoding = config.encoding()?;
        Ok(Self {
            bridge,
            recognizer,
            clock: Box::new(SystemClock),
            grid_cache: GridCache::new(config.grid_cache_capacity),
            config,
            captcha_title,
            export_encoding,
        })
    }

    /// Replace the clock used for settle delays and polling.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn recognizer_mut(&mut self) -> &mut R {
        &mut self.recognizer
    }

    /// Block for a fixed settle delay.
    pub fn wait(&self, duration: Duration) {
        self.clock.sleep(duration);
    }

    /// Resolve a grid control below the main window.
    ///
    /// Handles are reused from the cache while the bridge reports them alive.
    pub fn grid(&mut self, control_id: u32) -> Result<Handle, GridError> {
        let class_name = self.config.grid_class.clone();
        if let Some(handle) = self.grid_cache.get(control_id, &class_name) {
            if self.bridge.is_alive(handle) {
                return Ok(handle);
            }
            debug!(control_id, %handle, "cached grid handle is stale");
            self.grid_cache.remove(control_id, &class_name);
        }

        let main = self.bridge.main_window()?;
        let handle = self
            .bridge
            .find(main, &Locator::by_id(control_id, class_name.as_str()))?;
        self.grid_cache.insert(control_id, &class_name, handle);
        Ok(handle)
    }

    /// Number of cached grid handles.
    pub fn cached_grids(&self) -> usize {
        self.grid_cache.len()
    }

    /// Bring a window to the foreground, restoring it if minimized.
    ///
    /// Failures are logged and reported, never raised.
    pub fn foreground(&mut self, window: Handle) -> Foreground {
        let outcome = match self.bridge.is_minimized(window) {
            Ok(true) => self.bridge.restore(window).map(|()| Foreground::Restored),
            Ok(false) => self
                .bridge
                .set_foreground(window)
                .map(|()| Foreground::Raised),
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| {
            warn!(%window, error = %e, "could not bring window to foreground, continuing");
            Foreground::Failed(e)
        })
    }

    pub(crate) fn captcha_dir(&self) -> PathBuf {
        self.config.captcha_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{session, ScriptedBridge, ScriptedRecognizer, GRID_ID};

    #[test]
    fn test_grid_resolves_under_main_window() {
        let (mut session, _dir) = session(ScriptedBridge::new());
        let handle = session.grid(GRID_ID).unwrap();
        assert_eq!(handle, ScriptedBridge::grid_handle(GRID_ID));
        assert_eq!(session.bridge().grid_lookups, 1);
    }

    #[test]
    fn test_unknown_grid_is_not_found() {
        let (mut session, _dir) = session(ScriptedBridge::new());
        let err = session.grid(9999).unwrap_err();
        assert!(matches!(
            err,
            GridError::TransientUi(BridgeError::NotFound(_))
        ));
        assert_eq!(session.cached_grids(), 0);
    }

    #[test]
    fn test_grid_handles_are_cached() {
        let (mut session, _dir) = session(ScriptedBridge::new());
        session.grid(GRID_ID).unwrap();
        session.grid(GRID_ID).unwrap();
        assert_eq!(session.bridge().grid_lookups, 1);
        assert_eq!(session.cached_grids(), 1);
    }

    #[test]
    fn test_stale_cached_handle_is_resolved_again() {
        let (mut session, _dir) = session(ScriptedBridge::new());
        session.grid(GRID_ID).unwrap();
        session
            .bridge_mut()
            .dead
            .push(ScriptedBridge::grid_handle(GRID_ID));

        session.grid(GRID_ID).unwrap();
        assert_eq!(session.bridge().grid_lookups, 2);
    }

    #[test]
    fn test_cache_disabled_with_zero_capacity() {
        let config = GridConfig {
            grid_cache_capacity: 0,
            ..GridConfig::default()
        };
        let mut session =
            TraderSession::new(ScriptedBridge::new(), ScriptedRecognizer::new(&[]), config).unwrap();
        session.grid(GRID_ID).unwrap();
        session.grid(GRID_ID).unwrap();
        assert_eq!(session.bridge().grid_lookups, 2);
    }

    #[test]
    fn test_cache_evicts_oldest_entry() {
        let mut cache = GridCache::new(2);
        cache.insert(1, "G", Handle(1));
        cache.insert(2, "G", Handle(2));
        cache.insert(3, "G", Handle(3));
        assert_eq!(cache.get(1, "G"), None);
        assert_eq!(cache.get(3, "G"), Some(Handle(3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_foreground_raises_visible_window() {
        let (mut session, _dir) = session(ScriptedBridge::new());
        assert_eq!(session.foreground(Handle(1)), Foreground::Raised);
    }

    #[test]
    fn test_foreground_restores_minimized_window() {
        let mut bridge = ScriptedBridge::new();
        bridge.minimized = true;
        let (mut session, _dir) = session(bridge);
        assert_eq!(session.foreground(Handle(1)), Foreground::Restored);
    }

    #[test]
    fn test_foreground_failure_is_reported_not_raised() {
        let mut bridge = ScriptedBridge::new();
        bridge.foreground_fails = true;
        let (mut session, _dir) = session(bridge);
        assert!(matches!(
            session.foreground(Handle(1)),
            Foreground::Failed(BridgeError::Failed(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = GridConfig {
            export_encoding: "no-such-encoding".into(),
            ..GridConfig::default()
        };
        let result = TraderSession::new(
            ScriptedBridge::new(),
            ScriptedRecognizer::new(&[]),
            config,
        );
        assert!(matches!(result, Err(GridError::Config(_))));
    }
}
