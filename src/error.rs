// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the portfolio gateway.

use serde_json::Value;
use thiserror::Error;

/// Failure talking to a third-party API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream {0} is not configured")]
    NotConfigured(&'static str),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Upstream reported an error: {0}")]
    Reported(String),

    #[error("Malformed upstream payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Invalid service configuration detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL for {name}: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("Invalid header value for {name}: {value}")]
    InvalidHeaderValue { name: &'static str, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to register metric: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, UpstreamError>;

/// JavaScript-style truthiness of an upstream `err` field.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
