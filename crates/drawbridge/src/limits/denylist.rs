//! Temporary deny list fed by verification failures.
//!
//! Severe failures deny the address at once. Minor failures are counted and
//! deny it once the count reaches the threshold; counters reset after one
//! deny duration without failures.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use moat_common::FailureSeverity;

#[derive(Debug, Clone, Copy)]
struct FailureCount {
    count: u32,
    last: Instant,
}

pub struct DenyList {
    threshold: u32,
    duration: Duration,
    /// Address → deny expiry
    denied: DashMap<IpAddr, Instant>,
    failures: DashMap<IpAddr, FailureCount>,
}

impl DenyList {
    pub fn new(threshold: u32, duration: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            duration,
            denied: DashMap::new(),
            failures: DashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn is_denied_at(&self, address: &IpAddr, now: Instant) -> bool {
        self.denied.get(address).is_some_and(|until| *until > now)
    }

    #[cfg(test)]
    pub fn is_denied(&self, address: &IpAddr) -> bool {
        self.is_denied_at(address, Instant::now())
    }

    /// Time left on an active deny
    pub fn remaining_at(&self, address: &IpAddr, now: Instant) -> Option<Duration> {
        self.denied
            .get(address)
            .map(|until| until.saturating_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    /// Counts a failure; returns true if the address is denied afterwards
    pub fn record_failure_at(&self, address: IpAddr, severity: FailureSeverity, now: Instant) -> bool {
        let count = {
            let mut entry = self.failures.entry(address).or_insert(FailureCount { count: 0, last: now });
            if now.saturating_duration_since(entry.last) >= self.duration {
                entry.count = 0;
            }
            entry.count += 1;
            entry.last = now;
            entry.count
        };

        if severity.is_severe() || count >= self.threshold {
            self.denied.insert(address, now + self.duration);
            self.failures.remove(&address);
            return true;
        }
        false
    }

    pub fn record_failure(&self, address: IpAddr, severity: FailureSeverity) -> bool {
        self.record_failure_at(address, severity, Instant::now())
    }

    /// Lifts a deny and forgets counted failures
    pub fn remove(&self, address: &IpAddr) -> bool {
        self.failures.remove(address);
        self.denied.remove(address).is_some()
    }

    pub fn purge_at(&self, now: Instant) -> usize {
        let before = self.denied.len() + self.failures.len();
        self.denied.retain(|_, until| *until > now);
        self.failures
            .retain(|_, failures| now.saturating_duration_since(failures.last) < self.duration);
        before.saturating_sub(self.denied.len() + self.failures.len())
    }

    pub fn len(&self) -> usize {
        self.denied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.denied.is_empty()
    }
}

/// Periodically drops expired denies and stale failure counters
pub async fn deny_list_worker(
    deny_list: Arc<DenyList>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let purged = deny_list.purge_at(Instant::now());
                if purged > 0 {
                    tracing::debug!(purged = purged, denied = deny_list.len(), "Purged expired deny entries");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5));

    fn deny_list() -> DenyList {
        DenyList::new(2, Duration::from_secs(600))
    }

    #[test]
    fn test_severe_denies_immediately() {
        let list = deny_list();
        let now = Instant::now();
        assert!(list.record_failure_at(ADDR, FailureSeverity::Severe, now));
        assert!(list.is_denied_at(&ADDR, now));
        assert_eq!(list.remaining_at(&ADDR, now), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_minor_needs_threshold() {
        let list = deny_list();
        let now = Instant::now();
        assert!(!list.record_failure_at(ADDR, FailureSeverity::Minor, now));
        assert!(!list.is_denied_at(&ADDR, now));
        assert!(list.record_failure_at(ADDR, FailureSeverity::Minor, now + Duration::from_secs(5)));
        assert!(list.is_denied_at(&ADDR, now + Duration::from_secs(5)));
    }

    #[test]
    fn test_minor_counter_resets() {
        let list = deny_list();
        let now = Instant::now();
        list.record_failure_at(ADDR, FailureSeverity::Minor, now);
        let later = now + Duration::from_secs(601);
        assert!(!list.record_failure_at(ADDR, FailureSeverity::Minor, later));
    }

    #[test]
    fn test_deny_expires_and_purges() {
        let list = deny_list();
        let now = Instant::now();
        list.record_failure_at(ADDR, FailureSeverity::Severe, now);
        let later = now + Duration::from_secs(601);
        assert!(!list.is_denied_at(&ADDR, later));
        assert_eq!(list.remaining_at(&ADDR, later), None);
        assert_eq!(list.purge_at(later), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_lifts_deny() {
        let list = deny_list();
        list.record_failure(ADDR, FailureSeverity::Severe);
        assert!(list.remove(&ADDR));
        assert!(!list.is_denied(&ADDR));
        assert!(!list.remove(&ADDR));
    }
}
