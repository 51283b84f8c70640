// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the portfolio gateway.
//!
//! Every upstream failure is caught here and translated into the JSON
//! envelope of its endpoint; nothing propagates to the server.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::ConfigError;
use crate::gatekeeper::Gatekeeper;
use crate::limiter::{client_key, forwarded_client, RateLimitReason, RateLimitResult};
use crate::metrics::Metrics;
use crate::presence::{AwakeResponse, AwakeResult, PresenceClient, PresenceGuard};
use crate::relay::{ContactPayload, RelayClient, SendResponse, SendResult, UNKNOWN_SENDER};
use crate::repos::{RepoClient, RepoListing, RepoSnapshot, SnapshotStore};
use crate::validator::{ContactValidator, ValidationResult};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub gatekeeper: Gatekeeper,
    pub presence_guard: PresenceGuard,
    pub repos: RepoClient,
    pub snapshot: SnapshotStore,
    pub presence: PresenceClient,
    pub relay: RelayClient,
    pub validator: ContactValidator,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build the state with an explicit time source for the rate limiters.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.upstream.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            gatekeeper: Gatekeeper::new(&config.gatekeeper, clock.clone())?,
            presence_guard: PresenceGuard::new(&config.presence, clock),
            repos: RepoClient::new(http.clone(), config.repos.clone()),
            snapshot: SnapshotStore::new(),
            presence: PresenceClient::new(http.clone(), config.presence.clone()),
            relay: RelayClient::new(http, config.relay.clone()),
            validator: ContactValidator::new(&config.relay),
            metrics: Metrics::new()?,
            config,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.gather(),
    )
}

/// `GET /api/repos`: fetch and shape both repository lists on demand.
pub async fn list_repos(State(state): State<Arc<AppState>>) -> (StatusCode, Json<RepoListing>) {
    match state.repos.fetch_listing().await {
        Ok(listing) => (StatusCode::OK, Json(listing)),
        Err(e) => {
            error!(upstream = "repos", error = %e, "Error fetching repos");
            state
                .metrics
                .upstream_failures
                .with_label_values(&["repos"])
                .inc();
            (StatusCode::INTERNAL_SERVER_ERROR, Json(RepoListing::default()))
        }
    }
}

/// `GET /api/repos/snapshot`: the periodically refreshed listing.
pub async fn repo_snapshot(State(state): State<Arc<AppState>>) -> Json<RepoSnapshot> {
    Json(state.snapshot.get().await)
}

/// `GET /api/awake`: rate limited presence lookup.
pub async fn awake(State(state): State<Arc<AppState>>, headers: HeaderMap) -> AwakeResponse {
    let client = client_key(&headers);

    if let RateLimitResult::Limited { reason, retry_after } =
        state.presence_guard.check(&client).await
    {
        let (result, tier) = match reason {
            RateLimitReason::GlobalRateExceeded => (AwakeResult::GlobalRateLimited, "global"),
            RateLimitReason::ClientRateExceeded => (AwakeResult::ClientRateLimited, "client"),
        };
        info!(
            client = %client,
            tier,
            retry_after_secs = retry_after.as_secs(),
            "Presence request rate limited"
        );
        state
            .metrics
            .presence_rejections
            .with_label_values(&[tier])
            .inc();
        return AwakeResponse::bare(result);
    }

    match state.presence.status().await {
        Ok(status) => {
            debug!(client = %client, ?status, "Presence lookup succeeded");
            AwakeResponse::success(status)
        }
        Err(e) => {
            warn!(upstream = "presence", error = %e, "Presence lookup failed");
            state
                .metrics
                .upstream_failures
                .with_label_values(&["presence"])
                .inc();
            AwakeResponse::from_error(&e)
        }
    }
}

pub async fn awake_method_not_allowed() -> AwakeResponse {
    AwakeResponse::bare(AwakeResult::MethodNotAllowed)
}

/// `POST /api/send`: validate a contact message and relay it.
///
/// The embed author is the forwarded client address, else the peer address
/// of the connection, else [`UNKNOWN_SENDER`].
pub async fn send(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> SendResponse {
    let payload = match parse_contact(payload) {
        Some(payload) => payload,
        None => return SendResult::InvalidPayload.into(),
    };

    let email = payload.email.as_deref();
    let message = payload.message.as_deref();
    if let ValidationResult::Invalid(err) = state.validator.validate(email, message) {
        info!(error = %err, "Contact message rejected");
        return SendResult::from(&err).into();
    }

    let sender = forwarded_client(&headers)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()));
    let sender = sender.as_deref().unwrap_or(UNKNOWN_SENDER);

    match state
        .relay
        .deliver(
            email.unwrap_or_default(),
            message.unwrap_or_default(),
            sender,
        )
        .await
    {
        Ok(()) => {
            info!(sender, "Contact message relayed");
            state.metrics.messages_relayed.inc();
            SendResult::Success.into()
        }
        Err(e) => {
            error!(upstream = "relay", error = %e, "Webhook delivery failed");
            state
                .metrics
                .upstream_failures
                .with_label_values(&["relay"])
                .inc();
            SendResult::DiscordApiError.into()
        }
    }
}

/// Only a JSON object is accepted as a contact payload.
fn parse_contact(payload: Result<Json<Value>, JsonRejection>) -> Option<ContactPayload> {
    let value = match payload {
        Ok(Json(value @ Value::Object(_))) => value,
        Ok(Json(other)) => {
            info!(kind = json_kind(&other), "Contact payload is not an object");
            return None;
        }
        Err(rejection) => {
            info!(error = %rejection, "Unreadable contact payload");
            return None;
        }
    };

    match serde_json::from_value(value) {
        Ok(payload) => Some(payload),
        Err(e) => {
            info!(error = %e, "Malformed contact payload");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub async fn send_method_not_allowed() -> SendResponse {
    SendResult::MethodNotAllowed.into()
}
