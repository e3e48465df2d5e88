//! Precomputed CAPTCHA pool.
//!
//! Building a few hundred challenges takes seconds of CPU, so the pool is
//! filled on a blocking thread and published in one swap once the whole set
//! is ready. Until the first set lands `is_available()` is false and sessions
//! that need a challenge are turned away with the "preparing" message.
//!
//! The background worker rebuilds the set on a fixed interval so answers do
//! not stay around long enough to be harvested.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;

use super::{CaptchaChallenge, CaptchaGenerator};

type ChallengeSet = Arc<[Arc<CaptchaChallenge>]>;

/// Published challenge set plus build bookkeeping
pub struct CaptchaPool {
    /// Current set; replaced wholesale on rebuild
    published: RwLock<Option<ChallengeSet>>,
    generator: Arc<CaptchaGenerator>,
    /// Challenges per build
    precompute: usize,
    /// Set while a build runs
    building: AtomicBool,
    stats: PoolStats,
}

/// Runtime statistics
#[derive(Default)]
pub struct PoolStats {
    /// Challenges handed to sessions
    pub served: AtomicU64,
    /// Challenges generated over all builds
    pub generated: AtomicU64,
    /// Completed builds
    pub builds: AtomicU64,
    /// Requests made while nothing was published
    pub misses: AtomicU64,
    /// Duration of the last build in milliseconds
    pub last_build_ms: AtomicU64,
}

impl CaptchaPool {
    pub fn new(generator: Arc<CaptchaGenerator>, precompute: usize) -> Self {
        Self {
            published: RwLock::new(None),
            generator,
            precompute: precompute.max(1),
            building: AtomicBool::new(false),
            stats: PoolStats::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.published.read().is_some()
    }

    /// Challenges in the current set
    pub fn len(&self) -> usize {
        self.published.read().as_ref().map_or(0, |set| set.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }

    /// A random challenge from the current set
    pub fn random(&self) -> Option<Arc<CaptchaChallenge>> {
        // clone the set handle so the lock is not held while picking
        let set = self.published.read().clone();
        let Some(set) = set else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        let index = rand::rng().random_range(0..set.len());
        self.stats.served.fetch_add(1, Ordering::Relaxed);
        Some(set[index].clone())
    }

    /// Swaps in a finished set
    pub fn publish(&self, challenges: Vec<CaptchaChallenge>) {
        if challenges.is_empty() {
            return;
        }
        let set: ChallengeSet = challenges.into_iter().map(Arc::new).collect();
        *self.published.write() = Some(set);
    }

    /// Builds a full set on a blocking thread and publishes it.
    ///
    /// Returns `Ok(0)` without doing anything if a build is already running.
    pub async fn rebuild(self: &Arc<Self>) -> Result<usize> {
        if self
            .building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(0);
        }

        let pool = self.clone();
        let started = Instant::now();
        let built = tokio::task::spawn_blocking(move || {
            let mut rng = rand::rng();
            (0..pool.precompute)
                .map(|_| pool.generator.challenge(&mut rng))
                .collect::<Vec<_>>()
        })
        .await;
        self.building.store(false, Ordering::Release);

        let challenges = built.context("CAPTCHA build task failed")?;
        let count = challenges.len();
        self.publish(challenges);

        let elapsed = started.elapsed();
        self.stats.generated.fetch_add(count as u64, Ordering::Relaxed);
        self.stats.builds.fetch_add(1, Ordering::Relaxed);
        self.stats
            .last_build_ms
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
        Ok(count)
    }

    pub fn get_stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            available: self.is_available(),
            building: self.is_building(),
            size: self.len(),
            precompute: self.precompute,
            served: self.stats.served.load(Ordering::Relaxed),
            generated: self.stats.generated.load(Ordering::Relaxed),
            builds: self.stats.builds.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            last_build_ms: self.stats.last_build_ms.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pool statistics
#[derive(Clone, Debug, Serialize)]
pub struct PoolStatsSnapshot {
    pub available: bool,
    pub building: bool,
    pub size: usize,
    pub precompute: usize,
    pub served: u64,
    pub generated: u64,
    pub builds: u64,
    pub misses: u64,
    pub last_build_ms: u64,
}

/// Background worker: builds the first set right away, then rebuilds every
/// `refresh` until shutdown.
pub async fn captcha_pool_worker(
    pool: Arc<CaptchaPool>,
    refresh: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(
        "🧩 CAPTCHA pool worker started ({} challenges, refresh {}s)",
        pool.precompute,
        refresh.as_secs()
    );

    let mut interval = tokio::time::interval(refresh);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match pool.rebuild().await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!(
                        count = count,
                        elapsed_ms = pool.stats.last_build_ms.load(Ordering::Relaxed),
                        "🧩 CAPTCHA set published"
                    ),
                    Err(e) => tracing::error!(error = %e, "CAPTCHA pool build failed"),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("🧩 CAPTCHA pool worker shutting down...");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::{Background, Glyphs, IMAGE_SIZE, ImageGenerator};
    use image::{Rgb, RgbImage};
    use moat_common::CaptchaKind;

    fn pool(precompute: usize) -> Arc<CaptchaPool> {
        let images = ImageGenerator::new(
            Glyphs::Bitmap,
            Background::Picture(RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb([70, 70, 120]))),
        );
        let generator = CaptchaGenerator::new(CaptchaKind::Hand, "abc", 4, images).unwrap();
        Arc::new(CaptchaPool::new(Arc::new(generator), precompute))
    }

    #[test]
    fn test_unavailable_until_published() {
        let pool = pool(2);
        assert!(!pool.is_available());
        assert!(pool.random().is_none());
        assert_eq!(pool.get_stats().misses, 1);

        let image = RgbImage::new(IMAGE_SIZE, IMAGE_SIZE);
        pool.publish(vec![CaptchaChallenge::from_image("abca", &image)]);
        assert!(pool.is_available());
        assert_eq!(pool.random().unwrap().answer(), "abca");
        assert_eq!(pool.get_stats().served, 1);
    }

    #[test]
    fn test_empty_set_is_not_published() {
        let pool = pool(2);
        pool.publish(Vec::new());
        assert!(!pool.is_available());
    }

    #[tokio::test]
    async fn test_rebuild_publishes_full_set() {
        let pool = pool(3);
        let count = pool.rebuild().await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(pool.len(), 3);
        assert!(!pool.is_building());

        let stats = pool.get_stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.generated, 3);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_the_set() {
        let pool = pool(2);
        pool.rebuild().await.unwrap();
        let before = pool.published.read().clone().unwrap();
        pool.rebuild().await.unwrap();
        let after = pool.published.read().clone().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(pool.get_stats().builds, 2);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let pool = pool(1);
        let (tx, rx) = tokio::sync::broadcast::channel(1);
        let worker = tokio::spawn(captcha_pool_worker(pool.clone(), Duration::from_secs(3600), rx));
        while !pool.is_available() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();
        worker.await.unwrap();
    }
}
