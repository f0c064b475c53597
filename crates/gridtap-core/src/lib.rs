//! Core types and logic for gridtap.
//!
//! This crate reads tabular data out of a desktop trading client's grid
//! control, a virtual grid that exposes no automation API of its own. The
//! window system is reached through the [`bridge::UiBridge`] trait, so the
//! logic here runs unchanged against a real desktop or a scripted one.
//!
//! # Modules
//!
//! - [`host`]: `GridReader`, the strategy holder the trading workflow calls
//! - [`strategy`]: clipboard copy, message copy and file export
//! - [`captcha`]: the challenge/answer protocol guarding clipboard reads
//! - [`table`]: tab-separated payload decoding into typed rows
//! - [`session`]: bridge, recognizer, clock and config for one client
//! - [`keys`]: key sequences and their send-keys rendering
//! - [`config`]: JSON configuration with environment overrides
//! - [`error`]: error types with actionable suggestions
//!
//! # Reading a grid
//!
//! | Strategy | Name | Focus | Failure |
//! |----------|------|-------|---------|
//! | Clipboard copy | `copy` | no | `Ok(None)` |
//! | Message copy | `wm_copy` | no | `Ok(None)` |
//! | File export | `xls` | yes | `Err(..)` |
//!
//! `Ok(None)` tells the caller to retry the higher-level action. Calls on
//! one session must not overlap: the grid, the clipboard and the temporary
//! folders are shared.

pub mod bridge;
pub mod captcha;
pub mod clipboard;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod keys;
pub mod session;
pub mod strategy;
pub mod table;

#[cfg(test)]
pub(crate) mod test_support;
