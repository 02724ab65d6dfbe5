// fathom-server/src/config.rs
// ============================================================================
// Module: Fathom Server Config
// Description: Runtime configuration for the HTTP read API, layered on top
//              of the trace `Config`.
// Purpose: `spec.md` §6.1 host/port/auth/rate-limit/CORS knobs.
// Dependencies: fathom-config, serde
// ============================================================================

//! ## Overview
//! [`ServerConfig`] only covers transport concerns (bind address, optional
//! `X-API-Key`, rate limiting, CORS); storage location and retention still
//! come from [`fathom_config::Config`].

use serde::Deserialize;
use serde::Serialize;

/// Default bind host.
const DEFAULT_HOST: &str = "127.0.0.1";
/// Default bind port.
const DEFAULT_PORT: u16 = 8420;
/// Default per-IP rate limit (`spec.md` §6.1).
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 100;

/// HTTP server runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// When set, every request must carry a matching `X-API-Key` header.
    pub api_key: Option<String>,
    /// Per-IP request budget, per minute; `None` disables rate limiting.
    pub rate_limit_per_minute: Option<u32>,
    /// Origins allowed by CORS; empty means no `Access-Control-Allow-Origin`
    /// header is added.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            api_key: None,
            rate_limit_per_minute: Some(DEFAULT_RATE_LIMIT_PER_MINUTE),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parses the bind address as `host:port`.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
