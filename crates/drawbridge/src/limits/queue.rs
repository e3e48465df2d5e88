//! Admission queue bounding concurrent verifications.
//!
//! A connection either takes a free slot at once or waits in FIFO order.
//! Waiters are admitted by the queue worker, at most `max_polls` per tick.
//! Slots are released when the [`Permit`] is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_queue::SegQueue;
use serde::Serialize;
use tokio::sync::oneshot;

pub struct AdmissionQueue {
    max_active: usize,
    max_polls: usize,
    max_waiting: usize,
    active: AtomicUsize,
    waiting: SegQueue<oneshot::Sender<Permit>>,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

/// Outcome of [`AdmissionQueue::try_admit`]
#[derive(Debug)]
pub enum Admission {
    Admitted(Permit),
    Queued(Ticket),
    /// The waiting queue is full
    Rejected,
}

/// A verification slot; frees itself on drop
#[derive(Debug)]
pub struct Permit {
    queue: Arc<AdmissionQueue>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.queue.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Place in the waiting queue
#[derive(Debug)]
pub struct Ticket {
    rx: oneshot::Receiver<Permit>,
    /// Waiters ahead at the time of queueing, plus one
    pub position: usize,
}

impl Ticket {
    /// Resolves once admitted; `None` if the queue went away first
    pub async fn wait(self) -> Option<Permit> {
        self.rx.await.ok()
    }
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("active", &self.active())
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl AdmissionQueue {
    pub fn new(max_active: usize, max_polls: usize, max_waiting: usize) -> Self {
        Self {
            max_active: max_active.max(1),
            max_polls: max_polls.max(1),
            max_waiting,
            active: AtomicUsize::new(0),
            waiting: SegQueue::new(),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    fn reserve(&self) -> bool {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.max_active).then_some(active + 1)
            })
            .is_ok()
    }

    pub fn try_admit(self: &Arc<Self>) -> Admission {
        // arrivals never overtake waiters
        if self.waiting.is_empty() && self.reserve() {
            self.admitted.fetch_add(1, Ordering::Relaxed);
            return Admission::Admitted(Permit { queue: self.clone() });
        }
        let position = self.waiting.len();
        if position >= self.max_waiting {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Admission::Rejected;
        }
        let (tx, rx) = oneshot::channel();
        self.waiting.push(tx);
        Admission::Queued(Ticket {
            rx,
            position: position + 1,
        })
    }

    /// Admits waiters into free slots; returns how many were admitted
    pub fn tick(self: &Arc<Self>) -> usize {
        let mut admitted = 0;
        while admitted < self.max_polls {
            if !self.reserve() {
                break;
            }
            let Some(waiter) = self.waiting.pop() else {
                self.active.fetch_sub(1, Ordering::AcqRel);
                break;
            };
            // a waiter that hung up hands its permit straight back
            if waiter.send(Permit { queue: self.clone() }).is_ok() {
                admitted += 1;
            }
        }
        self.admitted.fetch_add(admitted as u64, Ordering::Relaxed);
        admitted
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }

    pub fn get_stats(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            active: self.active(),
            waiting: self.waiting(),
            max_active: self.max_active,
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct QueueStatsSnapshot {
    pub active: usize,
    pub waiting: usize,
    pub max_active: usize,
    pub admitted: u64,
    pub rejected: u64,
}

/// Polls the queue on a fixed interval until shutdown
pub async fn queue_worker(
    queue: Arc<AdmissionQueue>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(
        "🚦 Admission queue worker started (max {} verifying, {} per tick)",
        queue.max_active,
        queue.max_polls
    );
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let admitted = queue.tick();
                if admitted > 0 {
                    tracing::debug!(admitted = admitted, waiting = queue.waiting(), "Admitted queued connections");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("🚦 Admission queue worker shutting down...");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    fn queue(capacity: usize, polls: usize) -> Arc<AdmissionQueue> {
        Arc::new(AdmissionQueue::new(capacity, polls, 16))
    }

    fn admitted(admission: Admission) -> Permit {
        match admission {
            Admission::Admitted(permit) => permit,
            other => panic!("expected admission, got {other:?}"),
        }
    }

    fn queued(admission: Admission) -> Ticket {
        match admission {
            Admission::Queued(ticket) => ticket,
            other => panic!("expected a queue ticket, got {other:?}"),
        }
    }

    #[test]
    fn test_waits_until_slot_frees() {
        let queue = queue(2, 10);
        let first = admitted(queue.try_admit());
        let _second = admitted(queue.try_admit());
        let ticket = queued(queue.try_admit());
        assert_eq!(ticket.position, 1);

        let mut waiting = task::spawn(ticket.wait());
        assert_pending!(waiting.poll());
        assert_eq!(queue.tick(), 0);
        assert_pending!(waiting.poll());

        drop(first);
        assert_eq!(queue.active(), 1);
        assert_eq!(queue.tick(), 1);
        assert!(waiting.is_woken());
        let permit = assert_ready!(waiting.poll());
        assert!(permit.is_some());
        assert_eq!(queue.active(), 2);
    }

    #[test]
    fn test_fifo_order() {
        let queue = queue(1, 10);
        let holder = admitted(queue.try_admit());
        let mut first = task::spawn(queued(queue.try_admit()).wait());
        let mut second = task::spawn(queued(queue.try_admit()).wait());

        drop(holder);
        assert_eq!(queue.tick(), 1);
        let permit = assert_ready!(first.poll());
        assert_pending!(second.poll());

        drop(permit);
        assert_eq!(queue.tick(), 1);
        assert!(assert_ready!(second.poll()).is_some());
    }

    #[test]
    fn test_arrivals_do_not_overtake_waiters() {
        let queue = queue(1, 10);
        let holder = admitted(queue.try_admit());
        let _waiter = queued(queue.try_admit());
        drop(holder);
        // a slot is free, but someone is already waiting
        let late = queued(queue.try_admit());
        assert_eq!(late.position, 2);
    }

    #[test]
    fn test_polls_per_tick_are_bounded() {
        let queue = queue(10, 2);
        let permits: Vec<_> = (0..10).map(|_| admitted(queue.try_admit())).collect();
        let tickets: Vec<_> = (0..5).map(|_| queued(queue.try_admit())).collect();
        drop(permits);
        assert_eq!(queue.tick(), 2);
        assert_eq!(queue.tick(), 2);
        assert_eq!(queue.tick(), 1);
        assert_eq!(queue.waiting(), 0);
        drop(tickets);
    }

    #[test]
    fn test_abandoned_waiters_release_their_slot() {
        let queue = queue(1, 10);
        let holder = admitted(queue.try_admit());
        drop(queued(queue.try_admit()));
        drop(holder);
        assert_eq!(queue.tick(), 0);
        assert_eq!(queue.active(), 0);
    }

    #[test]
    fn test_rejects_when_waiting_queue_is_full() {
        let queue = Arc::new(AdmissionQueue::new(1, 1, 1));
        let _holder = admitted(queue.try_admit());
        let _waiter = queued(queue.try_admit());
        assert!(matches!(queue.try_admit(), Admission::Rejected));
        assert_eq!(queue.get_stats().rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_admits_on_interval() {
        let queue = queue(1, 1);
        let holder = admitted(queue.try_admit());
        let ticket = queued(queue.try_admit());
        let (tx, rx) = tokio::sync::broadcast::channel(1);
        let worker = tokio::spawn(queue_worker(queue.clone(), Duration::from_secs(1), rx));

        drop(holder);
        let permit = tokio::time::timeout(Duration::from_secs(5), ticket.wait())
            .await
            .unwrap();
        assert!(permit.is_some());

        tx.send(()).unwrap();
        worker.await.unwrap();
    }
}
