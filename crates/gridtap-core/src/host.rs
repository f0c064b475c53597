//! The object the trading workflow holds to read grids.

use std::time::Instant;

use tracing::debug;

use crate::bridge::UiBridge;
use crate::captcha::CaptchaRecognizer;
use crate::error::GridError;
use crate::session::TraderSession;
use crate::strategy::{GridStrategy, Strategy};
use crate::table::RowSet;

/// A strategy bound to a trader session.
///
/// The strategy can be swapped at any time. Reads fail with
/// [`GridError::Unbound`] until a session is attached.
pub struct GridReader<B, R> {
    strategy: Strategy,
    session: Option<TraderSession<B, R>>,
}

impl<B: UiBridge, R: CaptchaRecognizer> GridReader<B, R> {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            session: None,
        }
    }

    /// Bind to `session` with the strategy its configuration selects.
    pub fn bound(session: TraderSession<B, R>) -> Self {
        Self {
            strategy: Strategy::from_config(session.config()),
            session: Some(session),
        }
    }

    /// Attach a session, returning the one previously attached.
    pub fn set_trader(&mut self, session: TraderSession<B, R>) -> Option<TraderSession<B, R>> {
        self.session.replace(session)
    }

    pub fn take_trader(&mut self) -> Option<TraderSession<B, R>> {
        self.session.take()
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut Strategy {
        &mut self.strategy
    }

    pub fn set_strategy(&mut self, strategy: impl Into<Strategy>) {
        self.strategy = strategy.into();
    }

    pub fn session(&self) -> Option<&TraderSession<B, R>> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut TraderSession<B, R>> {
        self.session.as_mut()
    }

    /// Read the rows of a grid control through the current strategy.
    ///
    /// `Ok(None)` means this attempt produced nothing usable.
    pub fn get(&mut self, control_id: u32) -> Result<Option<RowSet>, GridError> {
        let session = self.session.as_mut().ok_or(GridError::Unbound)?;
        let started = Instant::now();
        let result = self.strategy.get(session, control_id);
        debug!(
            strategy = self.strategy.name(),
            control_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            rows = result.as_ref().ok().and_then(|r| r.as_ref()).map(RowSet::len),
            "grid read finished"
        );
        result
    }
}
