//! Common error types for Moat components.

use thiserror::Error;

/// Common errors across Moat components
#[derive(Debug, Error)]
pub enum MoatError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// CAPTCHA asset loading/generation error
    #[error("CAPTCHA error: {0}")]
    Captcha(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MoatError::Config("CAPTCHA dictionary is empty".into());
        assert_eq!(err.to_string(), "Configuration error: CAPTCHA dictionary is empty");
        assert!(MoatError::Captcha("bad font".into()).to_string().starts_with("CAPTCHA error"));
    }
}
