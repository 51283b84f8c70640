// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact message relay to a chat webhook.

use crate::config::RelayConfig;
use crate::error::{is_truthy, Result, UpstreamError};
use crate::validator::ValidationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Author shown on the embed when the sender address is unknown.
pub const UNKNOWN_SENDER: &str = "unknown!?";

/// Body accepted by `/api/send`. Fields are optional so a missing field is
/// reported as empty rather than as a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPayload {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome reported in the `result` field of `/api/send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendResult {
    #[serde(rename = "Success")]
    Success,
    #[serde(rename = "lol, nice try :)")]
    InvalidPayload,
    #[serde(rename = "FIELD_EMPTY")]
    FieldEmpty,
    #[serde(rename = "MESSAGE_TOO_LONG")]
    MessageTooLong,
    #[serde(rename = "NAME_TOO_LONG")]
    NameTooLong,
    #[serde(rename = "DISCORD_API_ERROR")]
    DiscordApiError,
    #[serde(rename = "Method Not Allowed")]
    MethodNotAllowed,
}

impl SendResult {
    /// Validation failures answer 500, matching what existing form clients
    /// expect.
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&ValidationError> for SendResult {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::MissingField(_) => Self::FieldEmpty,
            ValidationError::MessageTooLong { .. } => Self::MessageTooLong,
            ValidationError::EmailTooLong { .. } => Self::NameTooLong,
        }
    }
}

/// Body of `/api/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub result: SendResult,
}

impl From<SendResult> for SendResponse {
    fn from(result: SendResult) -> Self {
        Self { result }
    }
}

impl IntoResponse for SendResponse {
    fn into_response(self) -> Response {
        (self.result.status_code(), Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    color: u32,
    title: &'a str,
    author: EmbedAuthor<'a>,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbedAuthor<'a> {
    name: &'a str,
}

/// Webhook client. One delivery attempt per message.
pub struct RelayClient {
    http: reqwest::Client,
    config: RelayConfig,
}

impl RelayClient {
    pub fn new(http: reqwest::Client, config: RelayConfig) -> Self {
        Self { http, config }
    }

    /// Post a validated message as an embed titled with the sender's email.
    pub async fn deliver(&self, email: &str, message: &str, sender: &str) -> Result<()> {
        let url = self
            .config
            .webhook_url
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("WEBHOOK_URL"))?;

        let payload = WebhookPayload {
            embeds: [Embed {
                color: self.config.embed_color,
                title: email,
                author: EmbedAuthor { name: sender },
                description: message,
            }],
        };

        let response = self.http.post(url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        // Webhooks usually answer 204 with no body
        let body = response.text().await?;
        if !body.trim().is_empty() {
            let reply: Value = serde_json::from_str(&body)?;
            if let Some(err) = reply.get("err").filter(|e| is_truthy(e)) {
                return Err(UpstreamError::Reported(err.to_string()));
            }
        }

        debug!(%status, "Webhook accepted message");
        Ok(())
    }
}
