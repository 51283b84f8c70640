// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for the gateway.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

/// Counters owned by the application state.
///
/// Each instance has its own registry so several routers can coexist in one
/// process (tests build many).
pub struct Metrics {
    registry: Registry,
    /// Gatekeeper decisions by `outcome`
    pub gatekeeper_requests: IntCounterVec,
    /// Presence rejections by `tier` (global or client)
    pub presence_rejections: IntCounterVec,
    /// Failed outbound calls by `upstream`
    pub upstream_failures: IntCounterVec,
    pub messages_relayed: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let gatekeeper_requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Requests seen by the gatekeeper"),
            &["outcome"],
        )?;
        let presence_rejections = IntCounterVec::new(
            Opts::new(
                "gateway_presence_rejections_total",
                "Presence requests rejected by rate limiting",
            ),
            &["tier"],
        )?;
        let upstream_failures = IntCounterVec::new(
            Opts::new("gateway_upstream_failures_total", "Failed upstream calls"),
            &["upstream"],
        )?;
        let messages_relayed = IntCounter::new(
            "gateway_messages_relayed_total",
            "Contact messages delivered to the webhook",
        )?;

        registry.register(Box::new(gatekeeper_requests.clone()))?;
        registry.register(Box::new(presence_rejections.clone()))?;
        registry.register(Box::new(upstream_failures.clone()))?;
        registry.register(Box::new(messages_relayed.clone()))?;

        Ok(Self {
            registry,
            gatekeeper_requests,
            presence_rejections,
            upstream_failures,
            messages_relayed,
        })
    }

    /// Render every metric in the Prometheus text format.
    pub fn gather(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
