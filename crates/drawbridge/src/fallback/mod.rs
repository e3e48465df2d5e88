//! Fallback verification: one state machine per connecting client.
//!
//! A [`Session`] impersonates a minimal server. It is fed decoded packets by
//! the gateway, queues its replies in an outbox, and ends either verified or
//! with a [`SessionFailure`] describing what the client got wrong.

pub mod behavior;
mod failure;
mod session;

pub use failure::{SessionFailure, SessionState};
pub use session::Session;

use std::time::Duration;

use moat_common::CaptchaKind;
use regex::Regex;

use crate::config::Messages;

/// Patterns client-supplied strings must match
#[derive(Debug, Clone)]
pub struct Validation {
    pub username: Regex,
    pub brand: Regex,
    pub locale: Regex,
    pub chat: Regex,
}

/// Everything a session needs to know about the configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Handshake and behavior stages must finish within this time
    pub verification_timeout: Duration,
    pub gravity: bool,
    pub collision: bool,
    /// Falling movements required before landing
    pub movement_ticks: u32,
    /// Behavior checks only run while at least this many sessions are verifying
    pub behavior_min_verifying: usize,
    /// `None` disables the CAPTCHA stage
    pub captcha: Option<CaptchaKind>,
    pub captcha_max_attempts: u32,
    pub captcha_max_duration: Duration,
    pub validation: Validation,
    pub max_brand_length: usize,
    pub messages: Messages,
}

impl SessionSettings {
    pub fn behavior_enabled(&self) -> bool {
        self.gravity || self.collision
    }
}

/// Result of a packet that did not fail the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Verified,
}
