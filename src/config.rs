// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the portfolio gateway.
//!
//! Every value has a default so the service starts with an empty
//! environment; upstream credentials are optional and the matching
//! endpoints report an upstream error until they are provided.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Configuration for the portfolio gateway service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Request gatekeeper configuration
    #[serde(default)]
    pub gatekeeper: GatekeeperConfig,

    /// Repository listing configuration
    #[serde(default)]
    pub repos: RepoConfig,

    /// Presence proxy configuration
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Message relay configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// Shared outbound HTTP settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Permanent redirects served before any route
    #[serde(default = "default_redirects")]
    pub redirects: Vec<Redirect>,
}

/// Per-client cap and response headers applied to every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Maximum requests per window per client (default: 100)
    #[serde(default = "default_gatekeeper_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds (default: 60)
    #[serde(default = "default_gatekeeper_window_secs")]
    pub window_secs: u64,

    /// Value of `Access-Control-Allow-Origin` (default: *)
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    /// Path prefixes that bypass the gatekeeper
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,
}

/// Upstream accounts and shaping rules for the repository listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Token sent as a bearer credential, if any
    #[serde(default)]
    pub github_token: Option<String>,

    /// Base URL of the repository API (default: https://api.github.com)
    #[serde(default = "default_github_api_url")]
    pub api_base_url: String,

    /// Account whose list is filtered to a single named repository
    #[serde(default = "default_featured_account")]
    pub featured_account: String,

    /// Repository name picked from the featured account (case-insensitive)
    #[serde(default = "default_featured_repo")]
    pub featured_repo: String,

    /// Account whose most-starred repositories are listed
    #[serde(default = "default_owner_account")]
    pub owner_account: String,

    /// How many of the owner's repositories to keep (default: 3)
    #[serde(default = "default_top_count")]
    pub top_count: usize,

    /// Page size requested from upstream (default: 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Snapshot refresh cadence in seconds (default: 3600)
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Snapshot retry cadence after a failed refresh (default: 60)
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
}

/// Presence upstream and its two-tier limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Entity whose state drives `isDoNotDisturb`
    #[serde(default)]
    pub device: Option<String>,

    /// Optional entity whose state drives `isAwake`
    #[serde(default)]
    pub sensor_awake: Option<String>,

    /// Requests allowed across all clients per global window (default: 1000)
    #[serde(default = "default_presence_global_limit")]
    pub global_limit: u32,

    #[serde(default = "default_presence_global_window_secs")]
    pub global_window_secs: u64,

    /// Requests allowed per client per client window (default: 10)
    #[serde(default = "default_presence_client_limit")]
    pub client_limit: u32,

    /// 15 minutes by default
    #[serde(default = "default_presence_client_window_secs")]
    pub client_window_secs: u64,
}

/// Contact message relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Maximum message length in characters (default: 1000)
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,

    /// Maximum email length in characters (default: 500)
    #[serde(default = "default_max_email_len")]
    pub max_email_len: usize,

    /// Embed accent color
    #[serde(default = "default_embed_color")]
    pub embed_color: u32,
}

/// Settings shared by every outbound client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

/// A permanent redirect from a local path to an external URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub source: String,
    pub destination: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_gatekeeper_max_requests() -> u32 {
    100
}

fn default_gatekeeper_window_secs() -> u64 {
    60
}

fn default_allowed_origin() -> String {
    "*".to_string()
}

fn default_excluded_prefixes() -> Vec<String> {
    vec!["/_next/static".to_string(), "/favicon.ico".to_string()]
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_featured_account() -> String {
    "danny-avila".to_string()
}

fn default_featured_repo() -> String {
    "librechat".to_string()
}

fn default_owner_account() -> String {
    "berry-13".to_string()
}

fn default_top_count() -> usize {
    3
}

fn default_per_page() -> u32 {
    100
}

fn default_refresh_secs() -> u64 {
    3600
}

fn default_retry_secs() -> u64 {
    60
}

fn default_presence_global_limit() -> u32 {
    1000
}

fn default_presence_global_window_secs() -> u64 {
    60
}

fn default_presence_client_limit() -> u32 {
    10
}

fn default_presence_client_window_secs() -> u64 {
    15 * 60
}

fn default_max_message_len() -> usize {
    1000
}

fn default_max_email_len() -> usize {
    500
}

fn default_embed_color() -> u32 {
    3108090
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_redirects() -> Vec<Redirect> {
    [
        ("/github", "https://github.com/berry-13"),
        ("/twitter", "https://twitter.com/Berry13000"),
        ("/linkedin", "https://linkedin.com/in/marco-beretta-593635274/"),
    ]
    .into_iter()
    .map(|(source, destination)| Redirect {
        source: source.to_string(),
        destination: destination.to_string(),
    })
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            gatekeeper: GatekeeperConfig::default(),
            repos: RepoConfig::default(),
            presence: PresenceConfig::default(),
            relay: RelayConfig::default(),
            upstream: UpstreamConfig::default(),
            metrics: MetricsConfig::default(),
            redirects: default_redirects(),
        }
    }
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            max_requests: default_gatekeeper_max_requests(),
            window_secs: default_gatekeeper_window_secs(),
            allowed_origin: default_allowed_origin(),
            excluded_prefixes: default_excluded_prefixes(),
        }
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            api_base_url: default_github_api_url(),
            featured_account: default_featured_account(),
            featured_repo: default_featured_repo(),
            owner_account: default_owner_account(),
            top_count: default_top_count(),
            per_page: default_per_page(),
            refresh_secs: default_refresh_secs(),
            retry_secs: default_retry_secs(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: None,
            device: None,
            sensor_awake: None,
            global_limit: default_presence_global_limit(),
            global_window_secs: default_presence_global_window_secs(),
            client_limit: default_presence_client_limit(),
            client_window_secs: default_presence_client_window_secs(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_message_len: default_max_message_len(),
            max_email_len: default_max_email_len(),
            embed_color: default_embed_color(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl GatekeeperConfig {
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Whether a request path skips the gatekeeper.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl RepoConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }
}

impl PresenceConfig {
    pub fn global_window(&self) -> Duration {
        Duration::from_secs(self.global_window_secs)
    }

    pub fn client_window(&self) -> Duration {
        Duration::from_secs(self.client_window_secs)
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let defaults = Config::default();
        Config {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            gatekeeper: GatekeeperConfig {
                max_requests: env_or("GATEKEEPER_MAX_REQUESTS", defaults.gatekeeper.max_requests),
                window_secs: env_or("GATEKEEPER_WINDOW_SECS", defaults.gatekeeper.window_secs),
                allowed_origin: env_or("ALLOWED_ORIGIN", defaults.gatekeeper.allowed_origin),
                ..defaults.gatekeeper
            },
            repos: RepoConfig {
                github_token: env_opt("GITHUB_TOKEN"),
                api_base_url: env_or("GITHUB_API_URL", defaults.repos.api_base_url),
                refresh_secs: env_or("REPO_REFRESH_SECS", defaults.repos.refresh_secs),
                retry_secs: env_or("REPO_RETRY_SECS", defaults.repos.retry_secs),
                ..defaults.repos
            },
            presence: PresenceConfig {
                token: env_opt("AWAKE_TOKEN"),
                base_url: env_opt("AWAKE_BASE_URL"),
                device: env_opt("DEVICE"),
                sensor_awake: env_opt("SENSOR_AWAKE"),
                global_limit: env_or("AWAKE_GLOBAL_LIMIT", defaults.presence.global_limit),
                client_limit: env_or("AWAKE_CLIENT_LIMIT", defaults.presence.client_limit),
                ..defaults.presence
            },
            relay: RelayConfig {
                webhook_url: env_opt("WEBHOOK_URL"),
                ..defaults.relay
            },
            upstream: UpstreamConfig {
                timeout_secs: env_or("UPSTREAM_TIMEOUT_SECS", defaults.upstream.timeout_secs),
            },
            metrics: MetricsConfig {
                enabled: env_or("METRICS_ENABLED", defaults.metrics.enabled),
                ..defaults.metrics
            },
            redirects: defaults.redirects,
        }
    }
}

impl Config {
    /// Check that every configured upstream URL is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("GITHUB_API_URL", &self.repos.api_base_url)?;
        if let Some(url) = &self.presence.base_url {
            check_url("AWAKE_BASE_URL", url)?;
        }
        if let Some(url) = &self.relay.webhook_url {
            check_url("WEBHOOK_URL", url)?;
        }
        Ok(())
    }
}

fn check_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            name,
            value: value.to_string(),
        }),
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
