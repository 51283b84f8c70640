// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for driving the gateway router in-process.
//!
//! Requests go through the full router (gatekeeper included) with
//! `tower::ServiceExt::oneshot`; upstream APIs are served by `wiremock`.

#![allow(dead_code)]

pub mod upstream;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use portfolio_gateway::{build_app, AppState, Config, ManualClock};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const USER_AGENT: &str = "harness/1.0";

/// Router plus the clock driving its rate limiters.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new());
        let state = Arc::new(AppState::with_clock(config, clock.clone()).unwrap());
        Self {
            router: build_app(state.clone()),
            state,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, client: &str) -> Response<Body> {
        self.send(get(uri, client)).await
    }
}

/// GET request from `client` with a user agent.
pub fn get(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("user-agent", USER_AGENT)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

/// POST request with a JSON body.
pub fn post_json(uri: &str, client: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("user-agent", USER_AGENT)
        .header("x-forwarded-for", client)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
