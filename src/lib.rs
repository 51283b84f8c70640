// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Portfolio Gateway
//!
//! Server-side half of the portfolio site:
//!
//! - Request gatekeeper: per-client rate limiting (100 rpm default),
//!   user-agent check, request ids, security and CORS headers
//! - Repository aggregation with a periodically refreshed snapshot
//! - Presence proxy behind a global and a per-client limit
//! - Contact message validation and webhook relay

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod presence;
pub mod relay;
pub mod repos;
pub mod validator;

pub use app::build_app;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use handlers::AppState;
pub use limiter::{RateLimitResult, WindowLimiter};
pub use validator::{ContactValidator, ValidationResult};
