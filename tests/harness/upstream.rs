// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Mock upstream services.

use portfolio_gateway::config::{Config, PresenceConfig, RelayConfig, RepoConfig};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GITHUB_TOKEN: &str = "gh-test-token";
pub const AWAKE_TOKEN: &str = "awake-test-token";
pub const DEVICE: &str = "input_boolean.do_not_disturb";
pub const SENSOR: &str = "binary_sensor.awake";

/// Configuration pointing every upstream at `server`.
pub fn config_for(server: &MockServer) -> Config {
    Config {
        repos: RepoConfig {
            github_token: Some(GITHUB_TOKEN.to_string()),
            api_base_url: server.uri(),
            ..Default::default()
        },
        presence: PresenceConfig {
            token: Some(AWAKE_TOKEN.to_string()),
            base_url: Some(server.uri()),
            device: Some(DEVICE.to_string()),
            ..Default::default()
        },
        relay: RelayConfig {
            webhook_url: Some(format!("{}/webhook", server.uri())),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn repo(name: &str, stars: u64) -> Value {
    json!({
        "name": name,
        "stargazers_count": stars,
        "forks_count": stars / 10,
        "description": format!("{name} description"),
        "language": "TypeScript",
        "private": false
    })
}

/// Serve the owned repositories of `account`.
pub async fn mount_repos(server: &MockServer, account: &str, repos: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{account}/repos")))
        .and(query_param("type", "owner"))
        .and(query_param("per_page", "100"))
        .and(header("authorization", format!("Bearer {GITHUB_TOKEN}").as_str()))
        .and(header("accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repos))
        .mount(server)
        .await;
}

pub async fn mount_repos_failure(server: &MockServer, account: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{account}/repos")))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"message": "boom"})))
        .mount(server)
        .await;
}

/// Serve the state of one entity.
pub async fn mount_state(server: &MockServer, entity: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/states/{entity}")))
        .and(header("authorization", format!("Bearer {AWAKE_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Accept webhook posts, expecting exactly `times` of them.
pub async fn mount_webhook(server: &MockServer, status: u16, times: u64) {
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(status))
        .expect(times)
        .mount(server)
        .await;
}
