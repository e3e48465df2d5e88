//! Why a session ended without being verified.

use std::fmt;

use moat_common::FailureSeverity;
use thiserror::Error;

use crate::protocol::ProtocolError;

/// Stage of a verification session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake,
    BehaviorCheck,
    CaptchaHand,
    CaptchaPuzzle,
    Verified,
    Failed,
}

impl SessionState {
    pub fn is_captcha(self) -> bool {
        matches!(self, Self::CaptchaHand | Self::CaptchaPuzzle)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Verified | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Handshake => "handshake",
            Self::BehaviorCheck => "behavior check",
            Self::CaptchaHand => "captcha (hand)",
            Self::CaptchaPuzzle => "captcha (puzzle)",
            Self::Verified => "verified",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Error)]
pub enum SessionFailure {
    #[error("malformed packet: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unexpected {packet} during {state}")]
    Unexpected {
        state: SessionState,
        packet: &'static str,
    },

    #[error("{field} does not match the validation pattern")]
    InvalidInput { field: &'static str },

    #[error("behavior check failed: {0}")]
    Behavior(&'static str),

    #[error("too many wrong CAPTCHA answers")]
    Challenge,

    #[error("timed out during {stage}")]
    Timeout { stage: SessionState },

    #[error("CAPTCHA pool is still being prepared")]
    Preparing,
}

impl SessionFailure {
    /// How hard the failure counts against the address; `None` for failures
    /// that are not the client's fault
    pub fn severity(&self) -> Option<FailureSeverity> {
        match self {
            Self::Protocol(_) | Self::Unexpected { .. } | Self::InvalidInput { .. } | Self::Behavior(_) => {
                Some(FailureSeverity::Severe)
            }
            Self::Challenge | Self::Timeout { .. } => Some(FailureSeverity::Minor),
            Self::Preparing => None,
        }
    }

    /// Malformed or misordered traffic, as opposed to a failed check
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Unexpected { .. })
    }
}
