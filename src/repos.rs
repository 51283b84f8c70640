// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Repository listing aggregation.
//!
//! Fetches the owned repositories of two accounts and shapes them into the
//! two buckets shown on the home page: the featured project picked by name
//! from one account, and the most-starred repositories of the other.

use crate::config::RepoConfig;
use crate::error::{Result, UpstreamError};
use crate::handlers::AppState;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Projection of an upstream repository record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Payload of `/api/repos`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoListing {
    pub libre_chat_repos: Vec<Repository>,
    pub berry_repos: Vec<Repository>,
}

/// Keep the first repository whose name matches `name` case-insensitively.
pub fn select_featured(repos: Vec<Repository>, name: &str) -> Vec<Repository> {
    let wanted = name.to_lowercase();
    repos
        .into_iter()
        .find(|repo| repo.name.to_lowercase() == wanted)
        .into_iter()
        .collect()
}

/// Sort by star count, most starred first, and keep `n`. Ties keep upstream
/// order.
pub fn top_by_stars(mut repos: Vec<Repository>, n: usize) -> Vec<Repository> {
    repos.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
    repos.truncate(n);
    repos
}

/// Build the listing from the two raw upstream lists.
pub fn shape_listing(
    featured: Vec<Repository>,
    owned: Vec<Repository>,
    config: &RepoConfig,
) -> RepoListing {
    RepoListing {
        libre_chat_repos: select_featured(featured, &config.featured_repo),
        berry_repos: top_by_stars(owned, config.top_count),
    }
}

/// Client for the repository listing API.
pub struct RepoClient {
    http: reqwest::Client,
    config: RepoConfig,
}

impl RepoClient {
    pub fn new(http: reqwest::Client, config: RepoConfig) -> Self {
        Self { http, config }
    }

    /// List repositories owned by `account`.
    pub async fn list_owned(&self, account: &str) -> Result<Vec<Repository>> {
        let url = format!(
            "{}/users/{}/repos",
            self.config.api_base_url.trim_end_matches('/'),
            account
        );
        let per_page = self.config.per_page.to_string();

        let mut request = self
            .http
            .get(&url)
            .query(&[("type", "owner"), ("per_page", per_page.as_str())])
            .header(ACCEPT, GITHUB_ACCEPT);
        if let Some(token) = &self.config.github_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let repos: Vec<Repository> = response.json().await?;
        debug!(account, count = repos.len(), "Fetched repositories");
        Ok(repos)
    }

    /// Fetch both accounts concurrently and shape the result.
    pub async fn fetch_listing(&self) -> Result<RepoListing> {
        let (featured, owned) = tokio::try_join!(
            self.list_owned(&self.config.featured_account),
            self.list_owned(&self.config.owner_account),
        )?;
        Ok(shape_listing(featured, owned, &self.config))
    }

    /// Refresh `store` and return how long to wait before the next refresh.
    pub async fn refresh_snapshot(&self, store: &SnapshotStore) -> Duration {
        match self.fetch_listing().await {
            Ok(listing) => {
                info!(
                    featured = listing.libre_chat_repos.len(),
                    top = listing.berry_repos.len(),
                    "Repository snapshot refreshed"
                );
                store.publish(listing, Utc::now()).await;
                self.config.refresh_interval()
            }
            Err(e) => {
                let retry = self.config.retry_interval();
                warn!(error = %e, retry_in_secs = retry.as_secs(), "Repository snapshot refresh failed");
                retry
            }
        }
    }
}

/// Keep the snapshot fresh: refresh at startup, then wait whatever
/// [`RepoClient::refresh_snapshot`] asks for. Runs until the task is aborted.
pub async fn run_snapshot_refresher(state: Arc<AppState>) {
    loop {
        let delay = state.repos.refresh_snapshot(&state.snapshot).await;
        tokio::time::sleep(delay).await;
    }
}

/// Payload of `/api/repos/snapshot`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSnapshot {
    #[serde(flatten)]
    pub listing: RepoListing,
    /// When the listing was fetched; `None` until the first success
    pub generated_at: Option<DateTime<Utc>>,
}

/// Last successfully fetched listing. A failed refresh keeps the previous
/// snapshot.
#[derive(Default)]
pub struct SnapshotStore {
    current: RwLock<RepoSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> RepoSnapshot {
        self.current.read().await.clone()
    }

    pub async fn publish(&self, listing: RepoListing, generated_at: DateTime<Utc>) {
        *self.current.write().await = RepoSnapshot {
            listing,
            generated_at: Some(generated_at),
        };
    }
}
