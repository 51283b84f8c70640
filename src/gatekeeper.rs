// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request gatekeeper middleware.
//!
//! Runs in front of every route except static assets:
//! - per-client fixed-window cap (100 requests per minute by default)
//! - rejection of requests without a `User-Agent`
//! - request id and start time forwarded to the route
//! - security, CORS and response-time headers on the response

use crate::clock::Clock;
use crate::config::GatekeeperConfig;
use crate::error::ConfigError;
use crate::handlers::AppState;
use crate::limiter::{client_key, RateLimitResult, WindowLimiter};
use axum::{
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
            USER_AGENT, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_REQUEST_TIME: HeaderName = HeaderName::from_static("x-request-time");
pub const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");
const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

const SECURITY_HEADERS: [(HeaderName, &str); 6] = [
    (STRICT_TRANSPORT_SECURITY, "max-age=31536000; includeSubDomains"),
    (X_FRAME_OPTIONS, "DENY"),
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (PERMISSIONS_POLICY, "camera=(), microphone=(), geolocation=()"),
    (X_XSS_PROTECTION, "1; mode=block"),
];

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Per-client limiter plus the precomputed response headers.
pub struct Gatekeeper {
    limiter: WindowLimiter,
    allowed_origin: HeaderValue,
    config: GatekeeperConfig,
}

impl Gatekeeper {
    pub fn new(config: &GatekeeperConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let allowed_origin = HeaderValue::from_str(&config.allowed_origin).map_err(|_| {
            ConfigError::InvalidHeaderValue {
                name: "ALLOWED_ORIGIN",
                value: config.allowed_origin.clone(),
            }
        })?;

        Ok(Self {
            limiter: WindowLimiter::new(config.max_requests, config.window_duration(), clock),
            allowed_origin,
            config: config.clone(),
        })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.config.is_excluded(path)
    }

    /// Count a request from `client` against its window.
    pub async fn admit(&self, client: &str) -> RateLimitResult {
        self.limiter.hit(client).await
    }

    /// Drop expired client records. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        self.limiter.sweep_expired().await
    }

    pub async fn tracked_clients(&self) -> usize {
        self.limiter.tracked().await
    }

    fn apply_headers(&self, headers: &mut HeaderMap) {
        for (name, value) in SECURITY_HEADERS {
            headers.insert(name, HeaderValue::from_static(value));
        }
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allowed_origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
    }
}

/// Gatekeeper middleware, installed with `middleware::from_fn_with_state`.
pub async fn gatekeeper(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if state.gatekeeper.is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let started_at = Utc::now();
    let client = client_key(request.headers());

    if let RateLimitResult::Limited { retry_after, .. } = state.gatekeeper.admit(&client).await {
        info!(
            client = %client,
            path = %request.uri().path(),
            retry_after_secs = retry_after.as_secs(),
            "Request rate limited"
        );
        state
            .metrics
            .gatekeeper_requests
            .with_label_values(&["rate_limited"])
            .inc();
        return (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
    }

    if !request.headers().contains_key(USER_AGENT) {
        debug!(client = %client, "Request without user agent");
        state
            .metrics
            .gatekeeper_requests
            .with_label_values(&["missing_user_agent"])
            .inc();
        return (StatusCode::BAD_REQUEST, "Invalid Request").into_response();
    }

    let request_id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok();
    let headers = request.headers_mut();
    if let Some(id) = &request_id {
        headers.insert(X_REQUEST_ID, id.clone());
    }
    headers.insert(X_REQUEST_TIME, HeaderValue::from(started_at.timestamp_millis()));

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    state.gatekeeper.apply_headers(headers);
    if let Some(id) = request_id {
        headers.insert(X_REQUEST_ID, id);
    }
    if let Ok(elapsed) = HeaderValue::from_str(&format!("{}ms", started.elapsed().as_millis())) {
        headers.insert(X_RESPONSE_TIME, elapsed);
    }

    state
        .metrics
        .gatekeeper_requests
        .with_label_values(&["passed"])
        .inc();
    response
}

/// Drop expired client records every `period`. Runs until the task is
/// aborted.
pub async fn run_sweeper(state: Arc<AppState>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let removed = state.gatekeeper.sweep_expired().await;
        if removed > 0 {
            let tracked = state.gatekeeper.tracked_clients().await;
            debug!(removed, tracked, "Swept expired gatekeeper records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn test_invalid_origin_is_rejected() {
        let config = GatekeeperConfig {
            allowed_origin: "https://example.com\n".to_string(),
            ..Default::default()
        };
        let result = Gatekeeper::new(&config, Arc::new(SystemClock));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidHeaderValue { name: "ALLOWED_ORIGIN", .. })
        ));
    }

    #[test]
    fn test_apply_headers() {
        let config = GatekeeperConfig {
            allowed_origin: "https://example.com".to_string(),
            ..Default::default()
        };
        let gatekeeper = Gatekeeper::new(&config, Arc::new(SystemClock)).unwrap();
        let mut headers = HeaderMap::new();
        gatekeeper.apply_headers(&mut headers);

        assert_eq!(headers[X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers["permissions-policy"], "camera=(), microphone=(), geolocation=()");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://example.com");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
    }
}
