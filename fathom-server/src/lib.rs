// fathom-server/src/lib.rs
// ============================================================================
// Module: Fathom Server Library
// Description: Read-only HTTP API over a durable `fathom` store.
// Purpose: `spec.md` §6.1.
// Dependencies: crate::auth, crate::config, crate::error, crate::rate_limit,
//               crate::routes, crate::server, crate::telemetry
// ============================================================================

//! ## Overview
//! [`serve`] binds [`ServerConfig::bind_address`] and serves the run/step/
//! timeline read API backed by a [`fathom_store_sqlite::SqliteStore`].
//! [`build_router`] is exposed separately for callers that want to embed
//! the router (tests, or a host process composing more than one service).

mod auth;
mod config;
mod error;
mod rate_limit;
mod routes;
mod server;
mod telemetry;

pub use config::ServerConfig;
pub use error::ApiError;
pub use rate_limit::RateLimitDecision;
pub use rate_limit::RateLimiter;
pub use server::build_router;
pub use server::serve;
pub use server::ServeError;
pub use server::ServerState;
pub use telemetry::HttpRoute;
pub use telemetry::Reporter;
pub use telemetry::RequestOutcome;
pub use telemetry::StderrReporter;
