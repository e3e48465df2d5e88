//! Admission control applied before a session starts.

mod denylist;
mod queue;
mod ratelimit;

pub use denylist::{DenyList, deny_list_worker};
pub use queue::{Admission, AdmissionQueue, Permit, QueueStatsSnapshot, Ticket, queue_worker};
pub use ratelimit::{RateDecision, RateLimiter, rate_limit_worker};
