//! HTTP route handlers for the admin surface.

use axum::{
    Router,
    routing::{delete, get},
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod admin;
mod health;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Admin endpoints (bind the admin address to localhost in production)
        .nest("/admin", admin_routes())

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )

        // Add shared state
        .with_state(state)
}

/// Admin routes (statistics, verified and blacklist management)
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(admin::get_stats))
        .route("/verified", delete(admin::clear_verified))
        .route("/verified/{ip}", get(admin::get_verified).delete(admin::remove_verified))
        .route("/blacklist/{ip}", get(admin::get_blacklisted).delete(admin::remove_blacklisted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::tests::test_state;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use moat_common::{AddressRecord, FailureSeverity};
    use std::net::IpAddr;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let router = create_router(test_state(AppConfig::default()));
        let (status, body) = call(router.clone(), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = call(router, Method::GET, "/ready").await;
        assert_eq!(status, StatusCode::OK);

        let mut config = AppConfig::default();
        config.captcha.enabled = true;
        let router = create_router(test_state(config));
        let (status, _) = call(router, Method::GET, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_verified_lookup_and_removal() {
        let state = test_state(AppConfig::default());
        let address: IpAddr = "198.51.100.20".parse().unwrap();
        let identity = Uuid::from_u128(99);
        state.verified.add(AddressRecord::new(address, Some(identity)));
        let router = create_router(state.clone());

        let (status, body) = call(router.clone(), Method::GET, "/admin/verified/198.51.100.20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identities"][0], identity.to_string());

        let (status, _) = call(router.clone(), Method::DELETE, "/admin/verified/198.51.100.20").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!state.verified.has(&address));

        let (status, _) = call(router.clone(), Method::GET, "/admin/verified/198.51.100.20").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(router, Method::GET, "/admin/verified/not-an-ip").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_clear_verified() {
        let state = test_state(AppConfig::default());
        for last in 1..=3u8 {
            let address = IpAddr::from([10, 0, 0, last]);
            state.verified.add(AddressRecord::new(address, Some(Uuid::from_u128(last as u128))));
        }
        let router = create_router(state.clone());
        let (status, _) = call(router, Method::DELETE, "/admin/verified").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.verified.estimated_size(), 0);
    }

    #[tokio::test]
    async fn test_blacklist_shows_and_lifts_denies() {
        let state = test_state(AppConfig::default());
        let address: IpAddr = "192.0.2.44".parse().unwrap();
        state.deny_list.record_failure(address, FailureSeverity::Severe);
        let router = create_router(state.clone());

        let (status, body) = call(router.clone(), Method::GET, "/admin/blacklist/192.0.2.44").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["blacklisted"], false);
        assert!(body["denied_until"].is_string());

        let (status, _) = call(router.clone(), Method::DELETE, "/admin/blacklist/192.0.2.44").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!state.deny_list.is_denied(&address));

        let (status, _) = call(router, Method::GET, "/admin/blacklist/192.0.2.44").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats() {
        let router = create_router(test_state(AppConfig::default()));
        let (status, body) = call(router, Method::GET, "/admin/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], 0);
        assert_eq!(body["captcha"]["available"], false);
    }
}
