// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router assembly.

use crate::gatekeeper::gatekeeper;
use crate::handlers::{
    awake, awake_method_not_allowed, health, list_repos, metrics, repo_snapshot, send,
    send_method_not_allowed, AppState,
};
use axum::{
    middleware,
    response::Redirect,
    routing::{get, post},
    Router,
};
use std::future::ready;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the full router with the gatekeeper in front of every route.
pub fn build_app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/api/repos", get(list_repos))
        .route("/api/repos/snapshot", get(repo_snapshot))
        .route("/api/awake", get(awake).fallback(awake_method_not_allowed))
        .route("/api/send", post(send).fallback(send_method_not_allowed));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics));
    }

    for redirect in &state.config.redirects {
        let destination = redirect.destination.clone();
        router = router.route(
            &redirect.source,
            get(move || ready(Redirect::permanent(&destination))),
        );
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), gatekeeper))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
