//! Per-address attempt windows and the rejoin cooldown.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Attempt counter with a fixed expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateWindow {
    count: u32,
    expires: Instant,
}

/// Rate limit outcome for one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Too many attempts inside the window
    Limited,
    /// The previous attempt finished less than the rejoin delay ago
    CoolingDown,
}

pub struct RateLimiter {
    attempts: u32,
    window: Duration,
    rejoin_delay: Duration,
    windows: DashMap<IpAddr, RateWindow>,
    /// When each address last finished an attempt
    finished: DashMap<IpAddr, Instant>,
}

impl RateLimiter {
    pub fn new(attempts: u32, window: Duration, rejoin_delay: Duration) -> Self {
        Self {
            attempts,
            window,
            rejoin_delay,
            windows: DashMap::new(),
            finished: DashMap::new(),
        }
    }

    /// Counts an attempt and decides whether it may proceed
    pub fn check_at(&self, address: IpAddr, now: Instant) -> RateDecision {
        if self.cooling_down_at(&address, now) {
            return RateDecision::CoolingDown;
        }

        let mut window = self.windows.entry(address).or_insert(RateWindow {
            count: 0,
            expires: now + self.window,
        });
        // an expired window counts as absent
        if window.expires <= now {
            *window = RateWindow {
                count: 0,
                expires: now + self.window,
            };
        }
        window.count = window.count.saturating_add(1);

        if window.count > self.attempts {
            RateDecision::Limited
        } else {
            RateDecision::Allowed
        }
    }

    pub fn check(&self, address: IpAddr) -> RateDecision {
        self.check_at(address, Instant::now())
    }

    /// Attempts counted for the address in its current window
    #[cfg(test)]
    pub fn attempts_at(&self, address: &IpAddr, now: Instant) -> u32 {
        self.windows
            .get(address)
            .filter(|window| window.expires > now)
            .map_or(0, |window| window.count)
    }

    pub fn mark_finished_at(&self, address: IpAddr, now: Instant) {
        self.finished.insert(address, now);
    }

    pub fn mark_finished(&self, address: IpAddr) {
        self.mark_finished_at(address, Instant::now());
    }

    pub fn cooling_down_at(&self, address: &IpAddr, now: Instant) -> bool {
        self.finished
            .get(address)
            .is_some_and(|finished| now.saturating_duration_since(*finished) < self.rejoin_delay)
    }

    /// Drops expired windows and cooldowns; returns how many were removed
    pub fn purge_at(&self, now: Instant) -> usize {
        let before = self.windows.len() + self.finished.len();
        self.windows.retain(|_, window| window.expires > now);
        self.finished
            .retain(|_, finished| now.saturating_duration_since(*finished) < self.rejoin_delay);
        before.saturating_sub(self.windows.len() + self.finished.len())
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Periodically purges expired rate limit state
pub async fn rate_limit_worker(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let purged = limiter.purge_at(Instant::now());
                if purged > 0 {
                    tracing::debug!(purged = purged, "Purged expired rate limit entries");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
