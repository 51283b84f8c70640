// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Portfolio Gateway Service
//!
//! Serves the site's API routes behind the request gatekeeper.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and `.env`):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `ALLOWED_ORIGIN`: CORS origin (default: *)
//! - `GITHUB_TOKEN`: credential for the repository listing
//! - `AWAKE_TOKEN`, `AWAKE_BASE_URL`, `DEVICE`, `SENSOR_AWAKE`: presence upstream
//! - `WEBHOOK_URL`: contact message relay target

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portfolio_gateway::gatekeeper::run_sweeper;
use portfolio_gateway::repos::run_snapshot_refresher;
use portfolio_gateway::{build_app, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        max_requests = config.gatekeeper.max_requests,
        window_secs = config.gatekeeper.window_secs,
        allowed_origin = %config.gatekeeper.allowed_origin,
        presence_configured = config.presence.base_url.is_some(),
        relay_configured = config.relay.webhook_url.is_some(),
        "Starting portfolio gateway"
    );

    let state = Arc::new(AppState::new(config.clone())?);

    // Spawn gatekeeper cleanup task
    tokio::spawn(run_sweeper(state.clone(), Duration::from_secs(60)));

    // Spawn repository snapshot refresher
    tokio::spawn(run_snapshot_refresher(state.clone()));

    let app = build_app(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
