//! # Moat Common
//!
//! Shared types, defaults and errors used across Moat components.
//!
//! ## Modules
//! - `types` - Core data structures (CaptchaKind, FailureSeverity, AddressRecord)
//! - `error` - Common error types
//! - `constants` - Default configuration values and storage key layout

pub mod constants;
pub mod error;
pub mod types;

pub use error::MoatError;
pub use types::*;
