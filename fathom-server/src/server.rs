// fathom-server/src/server.rs
// ============================================================================
// Module: Fathom Server
// Description: Router assembly and the serving entry point.
// Purpose: `spec.md` §6.1 HTTP API surface.
// Dependencies: axum, tokio, tower-http
// ============================================================================

//! ## Overview
//! [`build_router`] wires the read-only endpoint table onto a
//! [`ServerState`]; [`serve`] binds it and runs until a shutdown signal
//! arrives, matching the teacher's `app_router`/graceful-shutdown shape.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::middleware;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use fathom_config::Config;
use fathom_store_sqlite::SqliteStore;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;

use crate::auth::require_api_key;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::rate_limit::RateLimitDecision;
use crate::rate_limit::RateLimiter;
use crate::routes;
use crate::telemetry::Reporter;
use crate::telemetry::StderrReporter;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct ServerState {
    /// Opened store backing every read handler.
    pub(crate) store: Arc<SqliteStore>,
    /// Trace config, needed for `blob_codec`/encryption-aware decoding.
    pub(crate) trace_config: Arc<Config>,
    /// Transport-level server configuration.
    pub(crate) config: Arc<ServerConfig>,
    /// Per-IP limiter; `None` when rate limiting is disabled.
    pub(crate) rate_limiter: Option<Arc<RateLimiter>>,
    /// Sink for per-request telemetry.
    pub(crate) reporter: Arc<dyn Reporter>,
}

impl ServerState {
    /// Builds state from an already-open store and trace config, installing
    /// a rate limiter when `config.rate_limit_per_minute` is set and the
    /// default [`StderrReporter`].
    #[must_use]
    pub fn new(store: Arc<SqliteStore>, trace_config: Config, config: ServerConfig) -> Self {
        let rate_limiter = config.rate_limit_per_minute.map(|per_minute| {
            Arc::new(RateLimiter::new(per_minute, std::time::Duration::from_secs(60)))
        });
        Self {
            store,
            trace_config: Arc::new(trace_config),
            config: Arc::new(config),
            rate_limiter,
            reporter: Arc::new(StderrReporter),
        }
    }
}

/// Applies `state.rate_limiter`, when configured, before the request
/// reaches its handler.
async fn rate_limit_guard(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return Ok(next.run(request).await);
    };
    match limiter.check(&addr.ip().to_string()) {
        RateLimitDecision::Allow => Ok(next.run(request).await),
        RateLimitDecision::Limited { retry_after_ms } => {
            Err(ApiError::RateLimited { retry_after_ms })
        }
    }
}

/// Builds the CORS layer from `config.cors_allowed_origins`; an empty list
/// means no CORS headers are added.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins = config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect::<Vec<_>>();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Assembles the full route table over `state`.
#[must_use]
pub fn build_router(state: ServerState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/runs", get(routes::list_runs))
        .route("/v1/runs/{run_id}", get(routes::get_run))
        .route("/v1/runs/{run_id}/steps", get(routes::get_steps))
        .route("/v1/runs/{run_id}/timeline", get(routes::get_timeline))
        .route(
            "/v1/runs/{run_id}/steps/{step_id}/data",
            get(routes::get_step_data),
        )
        .route("/v1/runs/{run_id}/export", get(routes::export_run))
        .route("/v1/stats", get(routes::stats))
        .layer(cors)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_guard))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

/// Failure building or running the HTTP listener.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The configured bind address could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that failed to bind.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The server loop exited with an I/O error.
    #[error("server loop failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Binds `config.bind_address()` and serves until `ctrl_c`/SIGTERM.
///
/// # Errors
///
/// Returns [`ServeError`] if the address cannot be bound or the accept
/// loop fails.
pub async fn serve(
    store: Arc<SqliteStore>,
    trace_config: Config,
    config: ServerConfig,
) -> Result<(), ServeError> {
    let address = config.bind_address();
    let state = ServerState::new(store, trace_config, config);
    let router = build_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|source| ServeError::Bind { address: address.clone(), source })?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Serve)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
