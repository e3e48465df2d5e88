//! Admin endpoints: statistics and address store management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use std::time::Instant;
use uuid::Uuid;

use crate::captcha::PoolStatsSnapshot;
use crate::limits::QueueStatsSnapshot;
use crate::state::AppState;

#[derive(Serialize)]
pub struct StatsResponse {
    uptime_secs: u64,
    verified: usize,
    blacklisted: usize,
    denied: usize,
    verifying: usize,
    rate_limited_addresses: usize,
    queue: QueueStatsSnapshot,
    captcha: PoolStatsSnapshot,
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        verified: state.verified.estimated_size(),
        blacklisted: state.blacklist.estimated_size(),
        denied: state.deny_list.len(),
        verifying: state.verifying.len(),
        rate_limited_addresses: state.rate_limiter.tracked(),
        queue: state.queue.get_stats(),
        captcha: state.captcha_pool.get_stats(),
    })
}

#[derive(Serialize)]
pub struct VerifiedResponse {
    address: IpAddr,
    identities: Vec<Uuid>,
}

pub async fn get_verified(
    State(state): State<AppState>,
    Path(address): Path<IpAddr>,
) -> Result<Json<VerifiedResponse>, StatusCode> {
    let identities = state.verified.identities(&address).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(VerifiedResponse { address, identities }))
}

pub async fn remove_verified(
    State(state): State<AppState>,
    Path(address): Path<IpAddr>,
) -> StatusCode {
    if state.verified.remove(&address) {
        tracing::info!(address = %address, "Verified address removed");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn clear_verified(State(state): State<AppState>) -> StatusCode {
    let removed = state.verified.estimated_size();
    state.verified.clear();
    tracing::info!(removed = removed, "Verified addresses cleared");
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
pub struct BlacklistResponse {
    address: IpAddr,
    /// Permanent blacklist entry
    blacklisted: bool,
    /// End of a temporary deny
    denied_until: Option<DateTime<Utc>>,
}

pub async fn get_blacklisted(
    State(state): State<AppState>,
    Path(address): Path<IpAddr>,
) -> Result<Json<BlacklistResponse>, StatusCode> {
    let blacklisted = state.blacklist.has(&address);
    let denied_until = state
        .deny_list
        .remaining_at(&address, Instant::now())
        .and_then(|left| chrono::Duration::from_std(left).ok())
        .map(|left| Utc::now() + left);
    if !blacklisted && denied_until.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(BlacklistResponse {
        address,
        blacklisted,
        denied_until,
    }))
}

/// Lifts both the permanent entry and any temporary deny
pub async fn remove_blacklisted(
    State(state): State<AppState>,
    Path(address): Path<IpAddr>,
) -> StatusCode {
    let blacklisted = state.blacklist.remove(&address);
    let denied = state.deny_list.remove(&address);
    if blacklisted || denied {
        tracing::info!(address = %address, "Address unbanned");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
