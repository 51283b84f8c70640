// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Presence proxy: reports whether the owner is in do-not-disturb mode and,
//! when a sensor is configured, whether they are awake.
//!
//! Requests pass two limits before the upstream is called:
//! 1. a global window shared by every client (1000 per minute by default)
//! 2. a per-client window (10 per 15 minutes by default)

use crate::clock::Clock;
use crate::config::PresenceConfig;
use crate::error::{is_truthy, Result, UpstreamError};
use crate::limiter::{GlobalWindow, RateLimitResult, WindowLimiter};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Outcome reported in the `result` field of `/api/awake`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwakeResult {
    #[serde(rename = "Success")]
    Success,
    #[serde(rename = "API_ERROR")]
    ApiError,
    #[serde(rename = "API_CALL_FAILED")]
    ApiCallFailed,
    #[serde(rename = "Method Not Allowed")]
    MethodNotAllowed,
    #[serde(rename = "Global rate limit exceeded")]
    GlobalRateLimited,
    #[serde(rename = "Rate limit exceeded, please don't DDoS me :)")]
    ClientRateLimited,
}

impl AwakeResult {
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            Self::ApiError | Self::ApiCallFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::GlobalRateLimited | Self::ClientRateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Body of `/api/awake`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwakeResponse {
    pub result: AwakeResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_do_not_disturb: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_awake: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AwakeResponse {
    /// A response carrying only a result code.
    pub fn bare(result: AwakeResult) -> Self {
        Self {
            result,
            is_do_not_disturb: None,
            is_awake: None,
            error: None,
        }
    }

    pub fn success(status: PresenceStatus) -> Self {
        Self {
            result: AwakeResult::Success,
            is_do_not_disturb: Some(status.do_not_disturb),
            is_awake: status.awake,
            error: None,
        }
    }

    pub fn from_error(err: &UpstreamError) -> Self {
        match err {
            UpstreamError::Reported(_) => Self::bare(AwakeResult::ApiError),
            other => Self {
                error: Some(other.to_string()),
                ..Self::bare(AwakeResult::ApiCallFailed)
            },
        }
    }
}

impl IntoResponse for AwakeResponse {
    fn into_response(self) -> Response {
        (self.result.status_code(), Json(self)).into_response()
    }
}

/// Entity state as returned by the upstream state API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityState {
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub err: Option<Value>,
}

impl EntityState {
    fn state_str(&self) -> Option<&str> {
        self.state.as_ref().and_then(Value::as_str)
    }
}

/// Mapped presence of the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceStatus {
    pub do_not_disturb: bool,
    pub awake: Option<bool>,
}

/// `"off"` and the literal string `"undefined"` mean the device is not in
/// do-not-disturb; anything else, a missing state included, means it is.
///
/// Both report the JSON boolean `false`. Older clients of this endpoint
/// received the string `"false"` for `"undefined"` and must accept either.
pub fn is_do_not_disturb(state: Option<&str>) -> bool {
    !matches!(state, Some("off") | Some("undefined"))
}

/// The awake sensor reports the literal string `"True"`.
pub fn is_awake(state: Option<&str>) -> bool {
    state == Some("True")
}

/// Client for the upstream state API.
pub struct PresenceClient {
    http: reqwest::Client,
    config: PresenceConfig,
}

impl PresenceClient {
    pub fn new(http: reqwest::Client, config: PresenceConfig) -> Self {
        Self { http, config }
    }

    /// Fetch the state of one entity.
    pub async fn fetch_state(&self, entity: &str) -> Result<EntityState> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("AWAKE_BASE_URL"))?;
        let url = format!("{}/api/states/{}", base_url.trim_end_matches('/'), entity);

        let mut request = self.http.get(&url).header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let entity_state: EntityState = response.json().await?;
        if let Some(err) = entity_state.err.as_ref().filter(|e| is_truthy(e)) {
            return Err(UpstreamError::Reported(err.to_string()));
        }

        debug!(entity, state = ?entity_state.state, "Fetched entity state");
        Ok(entity_state)
    }

    /// Fetch the device and, if configured, the awake sensor concurrently.
    pub async fn status(&self) -> Result<PresenceStatus> {
        let device = self
            .config
            .device
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("DEVICE"))?;

        match self.config.sensor_awake.as_deref() {
            Some(sensor) => {
                let (device_state, sensor_state) =
                    tokio::try_join!(self.fetch_state(device), self.fetch_state(sensor))?;
                Ok(PresenceStatus {
                    do_not_disturb: is_do_not_disturb(device_state.state_str()),
                    awake: Some(is_awake(sensor_state.state_str())),
                })
            }
            None => {
                let device_state = self.fetch_state(device).await?;
                Ok(PresenceStatus {
                    do_not_disturb: is_do_not_disturb(device_state.state_str()),
                    awake: None,
                })
            }
        }
    }
}

/// Two-tier admission for the presence endpoint.
pub struct PresenceGuard {
    global: GlobalWindow,
    clients: WindowLimiter,
}

impl PresenceGuard {
    pub fn new(config: &PresenceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            global: GlobalWindow::new(config.global_limit, config.global_window(), clock.clone()),
            clients: WindowLimiter::new(config.client_limit, config.client_window(), clock),
        }
    }

    /// Global window first, then an expiry sweep, then the client window.
    pub async fn check(&self, client: &str) -> RateLimitResult {
        let global = self.global.try_admit().await;
        if !global.is_allowed() {
            return global;
        }

        let swept = self.clients.sweep_expired().await;
        if swept > 0 {
            debug!(swept, "Expired presence client records");
        }

        self.clients.try_admit(client).await
    }
}
