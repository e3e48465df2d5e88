//! Application state and shared resources.

use anyhow::{Context, Result};
use dashmap::DashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::captcha::{CaptchaGenerator, CaptchaPool};
use crate::config::AppConfig;
use crate::fallback::SessionSettings;
use crate::limits::{AdmissionQueue, DenyList, RateLimiter};
use crate::store::AddressStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Settings handed to every session
    pub settings: Arc<SessionSettings>,

    /// Pre-generated CAPTCHA pool
    pub captcha_pool: Arc<CaptchaPool>,

    /// Concurrent verification slots
    pub queue: Arc<AdmissionQueue>,

    pub rate_limiter: Arc<RateLimiter>,

    /// Temporary bans after failures
    pub deny_list: Arc<DenyList>,

    /// Addresses and identities that passed verification
    pub verified: Arc<AddressStore>,

    /// Permanently banned addresses
    pub blacklist: Arc<AddressStore>,

    /// Addresses with a session in progress
    pub verifying: Arc<DashSet<IpAddr>>,

    pub started_at: Instant,
}

impl AppState {
    /// Create new application state around already loaded stores
    pub fn new(config: AppConfig, verified: Arc<AddressStore>, blacklist: Arc<AddressStore>) -> Result<Self> {
        let settings = Arc::new(config.session_settings()?);

        let generator =
            CaptchaGenerator::from_config(&config.captcha).context("Failed to set up CAPTCHA generator")?;
        let captcha_pool = Arc::new(CaptchaPool::new(Arc::new(generator), config.captcha.precompute));

        let queue = Arc::new(AdmissionQueue::new(
            config.queue.max_verifying,
            config.queue.max_polls,
            config.queue.max_size,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.attempts,
            Duration::from_secs(config.rate_limit.window_secs),
            Duration::from_millis(config.verification.rejoin_delay_ms),
        ));
        let deny_list = Arc::new(DenyList::new(
            config.blacklist.deny_threshold,
            Duration::from_secs(config.blacklist.deny_duration_secs),
        ));

        Ok(Self {
            config: Arc::new(config),
            settings,
            captcha_pool,
            queue,
            rate_limiter,
            deny_list,
            verified,
            blacklist,
            verifying: Arc::new(DashSet::new()),
            started_at: Instant::now(),
        })
    }

    /// Whether new sessions can run every configured stage
    pub fn is_ready(&self) -> bool {
        !self.config.captcha.enabled || self.captcha_pool.is_available()
    }

    /// Claims the address for one session; `None` if it already has one
    pub fn begin_verifying(&self, address: IpAddr) -> Option<VerifyingGuard> {
        self.verifying.insert(address).then(|| VerifyingGuard {
            verifying: self.verifying.clone(),
            address,
        })
    }
}

/// Releases the address claimed by [`AppState::begin_verifying`] on drop
pub struct VerifyingGuard {
    verifying: Arc<DashSet<IpAddr>>,
    address: IpAddr,
}

impl Drop for VerifyingGuard {
    fn drop(&mut self) {
        self.verifying.remove(&self.address);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use moat_common::constants::tables;

    /// In-memory state with default configuration
    pub(crate) fn test_state(config: AppConfig) -> AppState {
        let backend = Arc::new(MemoryBackend::new());
        let (verified, _) = AddressStore::new(tables::VERIFIED, backend.clone());
        let (blacklist, _) = AddressStore::new(tables::BLACKLIST, backend);
        AppState::new(config, Arc::new(verified), Arc::new(blacklist)).unwrap()
    }

    #[test]
    fn test_one_session_per_address() {
        let state = test_state(AppConfig::default());
        let address: IpAddr = "203.0.113.9".parse().unwrap();
        let guard = state.begin_verifying(address).unwrap();
        assert!(state.begin_verifying(address).is_none());
        drop(guard);
        assert!(state.begin_verifying(address).is_some());
    }

    #[test]
    fn test_ready_without_captcha() {
        let state = test_state(AppConfig::default());
        assert!(state.is_ready());

        let mut config = AppConfig::default();
        config.captcha.enabled = true;
        let state = test_state(config);
        assert!(!state.is_ready());
    }
}
