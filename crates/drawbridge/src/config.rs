//! Configuration management for Drawbridge.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use moat_common::CaptchaKind;
use moat_common::constants::*;

use crate::fallback::{SessionFailure, SessionSettings, Validation};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Game listener address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Backend server verified players are piped to
    #[serde(default = "default_backend_addr")]
    pub backend_addr: String,

    /// Admin HTTP address
    #[serde(default = "default_admin_addr")]
    pub admin_addr: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub verification: VerificationConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub captcha: CaptchaConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub blacklist: BlacklistConfig,

    #[serde(default)]
    pub messages: Messages,
}

/// Durable storage for the verified and blacklist tables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Redis connection URL; unset keeps everything in memory
    #[serde(default)]
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Time allowed for the handshake and behavior stages
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Longest silence tolerated between two packets
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Wait between two attempts from one address
    #[serde(default = "default_rejoin_delay_ms")]
    pub rejoin_delay_ms: u64,

    #[serde(default = "default_max_brand_length")]
    pub max_brand_length: usize,

    #[serde(default = "default_username_pattern")]
    pub username_pattern: String,

    #[serde(default = "default_brand_pattern")]
    pub brand_pattern: String,

    #[serde(default = "default_locale_pattern")]
    pub locale_pattern: String,

    #[serde(default = "default_chat_pattern")]
    pub chat_pattern: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            read_timeout_ms: default_read_timeout_ms(),
            rejoin_delay_ms: default_rejoin_delay_ms(),
            max_brand_length: default_max_brand_length(),
            username_pattern: default_username_pattern(),
            brand_pattern: default_brand_pattern(),
            locale_pattern: default_locale_pattern(),
            chat_pattern: default_chat_pattern(),
        }
    }
}

/// Gravity and collision checks
#[derive(Debug, Clone, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default = "default_true")]
    pub gravity: bool,

    #[serde(default = "default_true")]
    pub collision: bool,

    /// Falling movements required before landing
    #[serde(default = "default_movement_ticks")]
    pub movement_ticks: u32,

    /// Checks only run while at least this many sessions are verifying
    #[serde(default)]
    pub min_verifying: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            gravity: true,
            collision: true,
            movement_ticks: default_movement_ticks(),
            min_verifying: 0,
        }
    }
}

/// CAPTCHA-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub kind: CaptchaKind,

    /// Characters answers are drawn from
    #[serde(default = "default_dictionary")]
    pub dictionary: String,

    #[serde(default = "default_answer_length")]
    pub answer_length: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    /// Challenges generated per pool build
    #[serde(default = "default_precompute")]
    pub precompute: usize,

    /// Seconds between pool rebuilds
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// TrueType font for answers; the built-in bitmap font otherwise
    #[serde(default)]
    pub font_path: Option<String>,

    /// Background picture; fractal noise otherwise
    #[serde(default)]
    pub background_path: Option<String>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: CaptchaKind::default(),
            dictionary: default_dictionary(),
            answer_length: default_answer_length(),
            max_attempts: default_max_attempts(),
            max_duration_secs: default_max_duration_secs(),
            precompute: default_precompute(),
            refresh_secs: default_refresh_secs(),
            font_path: None,
            background_path: None,
        }
    }
}

/// Admission queue sizing
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Sessions verified at the same time
    #[serde(default = "default_max_verifying")]
    pub max_verifying: usize,

    /// Waiters admitted per poll
    #[serde(default = "default_max_polls")]
    pub max_polls: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Longest a queued connection waits for a slot
    #[serde(default = "default_queue_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Waiting connections beyond this are turned away
    #[serde(default = "default_max_queue_size")]
    pub max_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_verifying: default_max_verifying(),
            max_polls: default_max_polls(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: default_queue_max_wait_secs(),
            max_size: default_max_queue_size(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Attempts allowed per address inside one window
    #[serde(default = "default_rate_attempts")]
    pub attempts: u32,

    #[serde(default = "default_rate_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            attempts: default_rate_attempts(),
            window_secs: default_rate_window_secs(),
        }
    }
}

/// Temporary and permanent bans
#[derive(Debug, Clone, Deserialize)]
pub struct BlacklistConfig {
    /// Minor failures before a temporary deny
    #[serde(default = "default_deny_threshold")]
    pub deny_threshold: u32,

    #[serde(default = "default_deny_duration_secs")]
    pub deny_duration_secs: u64,

    /// Also blacklist permanently on severe failures
    #[serde(default)]
    pub blacklist_on_severe: bool,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            deny_threshold: default_deny_threshold(),
            deny_duration_secs: default_deny_duration_secs(),
            blacklist_on_severe: false,
        }
    }
}

/// Text shown to players. `{attempts}`, `{seconds}` and `{position}` are
/// substituted where noted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub verified: String,
    pub failed: String,
    pub too_long: String,
    pub preparing: String,
    pub captcha_hand: String,
    pub captcha_puzzle: String,
    /// `{attempts}`: attempts left
    pub incorrect_captcha: String,
    pub queue_full: String,
    /// Sent when the queue wait runs out; `{position}`: place in the queue
    pub queued: String,
    pub rate_limited: String,
    pub rejoin_too_fast: String,
    /// `{seconds}`: time until the deny expires
    pub denied: String,
    pub blacklisted: String,
    pub unsupported_version: String,
    pub invalid_username: String,
    pub already_verifying: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            verified: "Verification successful. Please reconnect to join the server.".into(),
            failed: "Verification failed. Please try again.".into(),
            too_long: "You took too long to answer the CAPTCHA.".into(),
            preparing: "Verification is still being prepared. Please reconnect in a moment.".into(),
            captcha_hand: "Type the code shown on the map into chat.".into(),
            captcha_puzzle: "Select the hotbar slot marked on the map and swing your arm.".into(),
            incorrect_captcha: "Wrong answer, {attempts} attempts left.".into(),
            queue_full: "Too many players are joining right now. Please try again later.".into(),
            queued: "The verification queue is busy (you were number {position}). Please reconnect in a moment.".into(),
            rate_limited: "You are connecting too often. Please wait a minute.".into(),
            rejoin_too_fast: "You are reconnecting too fast. Please wait a few seconds.".into(),
            denied: "You failed verification too often. Try again in {seconds} seconds.".into(),
            blacklisted: "You are blacklisted from this server.".into(),
            unsupported_version: "Your game version is not supported.".into(),
            invalid_username: "Your username contains invalid characters.".into(),
            already_verifying: "You are already being verified.".into(),
        }
    }
}

impl Messages {
    /// Disconnect text for a failed session
    pub fn for_failure(&self, failure: &SessionFailure) -> &str {
        match failure {
            SessionFailure::Timeout { stage } if stage.is_captcha() => &self.too_long,
            SessionFailure::Preparing => &self.preparing,
            _ => &self.failed,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_backend_addr() -> String { DEFAULT_BACKEND_ADDR.to_string() }
fn default_admin_addr() -> String { DEFAULT_ADMIN_ADDR.to_string() }
fn default_timeout_secs() -> u64 { VERIFICATION_TIMEOUT_SECS }
fn default_read_timeout_ms() -> u64 { READ_TIMEOUT_MS }
fn default_rejoin_delay_ms() -> u64 { REJOIN_DELAY_MS }
fn default_max_brand_length() -> usize { MAX_BRAND_LENGTH }
fn default_username_pattern() -> String { r"^[a-zA-Z0-9_.*!]+$".to_string() }
fn default_brand_pattern() -> String { r"^[!-~ ]+$".to_string() }
fn default_locale_pattern() -> String { r"^[a-zA-Z_]+$".to_string() }
fn default_chat_pattern() -> String { r"^[!-~ ]+$".to_string() }
fn default_true() -> bool { true }
fn default_movement_ticks() -> u32 { MOVEMENT_TICKS }
fn default_dictionary() -> String { CAPTCHA_DICTIONARY.to_string() }
fn default_answer_length() -> usize { CAPTCHA_ANSWER_LENGTH }
fn default_max_attempts() -> u32 { CAPTCHA_MAX_ATTEMPTS }
fn default_max_duration_secs() -> u64 { CAPTCHA_MAX_DURATION_SECS }
fn default_precompute() -> usize { CAPTCHA_PRECOMPUTE }
fn default_refresh_secs() -> u64 { CAPTCHA_REFRESH_SECS }
fn default_max_verifying() -> usize { MAX_VERIFYING }
fn default_max_polls() -> usize { MAX_QUEUE_POLLS }
fn default_poll_interval_ms() -> u64 { QUEUE_POLL_INTERVAL_MS }
fn default_queue_max_wait_secs() -> u64 { QUEUE_MAX_WAIT_SECS }
fn default_max_queue_size() -> usize { MAX_QUEUE_SIZE }
fn default_rate_attempts() -> u32 { RATE_LIMIT_ATTEMPTS }
fn default_rate_window_secs() -> u64 { RATE_LIMIT_WINDOW_SECS }
fn default_deny_threshold() -> u32 { DENY_THRESHOLD }
fn default_deny_duration_secs() -> u64 { DENY_DURATION_SECS }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            Self::from_source(config::File::with_name(config_path))?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.storage.redis_url = Some(redis_url.clone());
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref backend) = args.backend {
            config.backend_addr = backend.clone();
        }
        if let Some(ref admin) = args.admin {
            config.admin_addr = admin.clone();
        }

        Ok(config)
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to load config file")?;

        let config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the background workers cannot run with
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.captcha.refresh_secs > 0, "captcha.refresh_secs must be positive");
        anyhow::ensure!(
            !self.captcha.enabled || self.captcha.precompute > 0,
            "captcha.precompute must be positive when CAPTCHAs are enabled"
        );
        anyhow::ensure!(self.queue.poll_interval_ms > 0, "queue.poll_interval_ms must be positive");
        anyhow::ensure!(self.queue.max_wait_secs > 0, "queue.max_wait_secs must be positive");
        Ok(())
    }

    pub fn validation(&self) -> Result<Validation> {
        let verification = &self.verification;
        let compile = |name: &str, pattern: &str| {
            Regex::new(pattern).with_context(|| format!("Invalid {name} pattern {pattern:?}"))
        };
        Ok(Validation {
            username: compile("username", &verification.username_pattern)?,
            brand: compile("brand", &verification.brand_pattern)?,
            locale: compile("locale", &verification.locale_pattern)?,
            chat: compile("chat", &verification.chat_pattern)?,
        })
    }

    /// Settings shared by every session
    pub fn session_settings(&self) -> Result<SessionSettings> {
        Ok(SessionSettings {
            verification_timeout: Duration::from_secs(self.verification.timeout_secs),
            gravity: self.behavior.gravity,
            collision: self.behavior.collision,
            movement_ticks: self.behavior.movement_ticks,
            behavior_min_verifying: self.behavior.min_verifying,
            captcha: self.captcha.enabled.then_some(self.captcha.kind),
            captcha_max_attempts: self.captcha.max_attempts,
            captcha_max_duration: Duration::from_secs(self.captcha.max_duration_secs),
            validation: self.validation()?,
            max_brand_length: self.verification.max_brand_length,
            messages: self.messages.clone(),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            backend_addr: default_backend_addr(),
            admin_addr: default_admin_addr(),
            storage: StorageConfig::default(),
            verification: VerificationConfig::default(),
            behavior: BehaviorConfig::default(),
            captcha: CaptchaConfig::default(),
            queue: QueueConfig::default(),
            rate_limit: RateLimitConfig::default(),
            blacklist: BlacklistConfig::default(),
            messages: Messages::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::SessionState;
    use clap::Parser;

    fn from_toml(text: &str) -> Result<AppConfig> {
        AppConfig::from_source(config::File::from_str(text, config::FileFormat::Toml))
    }

    #[test]
    fn test_defaults_build_session_settings() {
        let settings = AppConfig::default().session_settings().unwrap();
        assert_eq!(settings.verification_timeout, Duration::from_secs(VERIFICATION_TIMEOUT_SECS));
        assert_eq!(settings.captcha, None);
        assert!(settings.validation.username.is_match("Notch_99"));
        assert!(!settings.validation.username.is_match("bad name"));
        assert!(settings.validation.locale.is_match("en_US"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = from_toml(
            r#"
            backend_addr = "10.0.0.2:25565"

            [captcha]
            enabled = true
            kind = "puzzle"
            max_attempts = 5

            [messages]
            verified = "welcome"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend_addr, "10.0.0.2:25565");
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.captcha.kind, CaptchaKind::Puzzle);
        assert_eq!(config.captcha.max_attempts, 5);
        assert_eq!(config.captcha.dictionary, CAPTCHA_DICTIONARY);
        assert_eq!(config.messages.verified, "welcome");
        assert_eq!(config.messages.blacklisted, Messages::default().blacklisted);

        let settings = config.session_settings().unwrap();
        assert_eq!(settings.captcha, Some(CaptchaKind::Puzzle));
    }

    #[test]
    fn test_zero_worker_intervals_are_rejected() {
        let error = from_toml("[captcha]\nrefresh_secs = 0").unwrap_err();
        assert!(error.to_string().contains("refresh_secs"));

        let error = from_toml("[queue]\npoll_interval_ms = 0").unwrap_err();
        assert!(error.to_string().contains("poll_interval_ms"));

        let error = from_toml("[captcha]\nenabled = true\nprecompute = 0").unwrap_err();
        assert!(error.to_string().contains("precompute"));

        assert!(from_toml("[queue]\npoll_interval_ms = 250").is_ok());
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let mut config = AppConfig::default();
        config.verification.chat_pattern = "([".into();
        let error = config.session_settings().unwrap_err();
        assert!(error.to_string().contains("chat"));
    }

    #[test]
    fn test_cli_overrides() {
        let args = crate::Args::parse_from([
            "drawbridge",
            "--config",
            "does/not/exist.toml",
            "--backend",
            "127.0.0.1:30000",
            "--redis-url",
            "redis://cache:6379",
        ]);
        let config = AppConfig::load(&args.config, &args).unwrap();
        assert_eq!(config.backend_addr, "127.0.0.1:30000");
        assert_eq!(config.storage.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn test_failure_messages() {
        let messages = Messages::default();
        let captcha_timeout = SessionFailure::Timeout {
            stage: SessionState::CaptchaHand,
        };
        assert_eq!(messages.for_failure(&captcha_timeout), messages.too_long);
        assert_eq!(messages.for_failure(&SessionFailure::Preparing), messages.preparing);
        assert_eq!(messages.for_failure(&SessionFailure::Challenge), messages.failed);
    }
}
