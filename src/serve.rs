//! Purpose: Serve the search provider over HTTP/JSON.
//! Exports: `ServeConfig`, `serve`, `serve_with_listener`, `build_dispatcher`, `router`.
//! Role: Long-lived process: one call endpoint plus health, stopped by signal or inactivity.
//! Invariants: Non-loopback binds require explicit opt-in.
//! Invariants: Shutdown drains in-flight calls for at most `SHUTDOWN_DRAIN`.
//! Invariants: Bus replies are always `200 OK`; failures travel in the reply envelope.

use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::bus::BusDispatcher;
use crate::catalog::{Catalog, RemoteCatalog};
use crate::core::error::{Error, ErrorKind};
use crate::idle::IdleTimer;
use crate::launch::{CommandLauncher, LaunchDispatcher, Launcher};
use crate::provider::SearchProvider;
use crate::router::ObjectRouter;

pub const DEFAULT_BIND: &str = "127.0.0.1:9710";
pub const DEFAULT_MAX_BODY_BYTES: u64 = 256 * 1024;
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub catalog_url: String,
    pub catalog_token: Option<String>,
    pub base_path: String,
    pub scheme: String,
    pub launcher: String,
    pub inactivity_timeout_ms: u64,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<BusDispatcher>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let max_body_bytes = max_body_limit(config.max_body_bytes)?;
    let mut catalog = RemoteCatalog::new(config.catalog_url.clone())?;
    if let Some(token) = config.catalog_token.clone() {
        catalog = catalog.with_token(token);
    }
    let launcher = CommandLauncher::from_command_line(&config.launcher)?;
    let idle = Arc::new(IdleTimer::new(Duration::from_millis(
        config.inactivity_timeout_ms,
    )));
    let dispatcher = build_dispatcher(
        &config,
        Arc::new(catalog),
        Arc::new(launcher),
        idle,
    );

    let listener = TcpListener::bind(config.bind).await.map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to bind server")
            .with_source(err)
    })?;
    info!(
        bind = %config.bind,
        base_path = %config.base_path,
        catalog = %config.catalog_url,
        "search provider listening"
    );

    serve_with_listener(listener, Arc::new(dispatcher), max_body_bytes).await
}

/// Wires router, provider and launcher into a dispatcher.
pub fn build_dispatcher(
    config: &ServeConfig,
    catalog: Arc<dyn Catalog>,
    launcher: Arc<dyn Launcher>,
    idle: Arc<IdleTimer>,
) -> BusDispatcher {
    let provider = SearchProvider::new(
        catalog,
        LaunchDispatcher::new(config.scheme.clone(), launcher),
        idle,
    );
    BusDispatcher::new(ObjectRouter::new(config.base_path.clone()), provider)
}

pub fn router(dispatcher: Arc<BusDispatcher>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v0/call", post(call))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { dispatcher })
}

/// Runs until a shutdown signal arrives or the provider goes idle.
pub async fn serve_with_listener(
    listener: TcpListener,
    dispatcher: Arc<BusDispatcher>,
    max_body_bytes: usize,
) -> Result<(), Error> {
    let idle = Arc::clone(dispatcher.provider().idle());
    let app = router(dispatcher, max_body_bytes);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    let reason = tokio::select! {
        result = &mut server => {
            return result.map_err(server_error);
        }
        _ = shutdown_signal() => "signal",
        _ = idle.expired() => "inactivity",
    };

    info!(reason, "shutting down");
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_DRAIN, &mut server).await {
        Ok(result) => result.map_err(server_error),
        Err(_) => Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out")),
    }
}

fn server_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("server failed")
        .with_source(err)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.inactivity_timeout_ms == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--inactivity-timeout-ms must be greater than zero")
            .with_hint("Use a positive value like 20000."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 262144."));
    }

    if !config.base_path.starts_with('/') {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--base-path must be an absolute object path")
            .with_hint("Use a value like /org/channelsearch/SearchProvider."));
    }

    if config.scheme.is_empty()
        || !config
            .scheme
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
    {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--scheme must be a valid URI scheme")
            .with_hint("Use a value like x-channel-dispatch."));
    }

    Ok(())
}

fn max_body_limit(max_body_bytes: u64) -> Result<usize, Error> {
    usize::try_from(max_body_bytes).map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory.")
    })
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn call(State(state): State<AppState>, body: Result<Json<Value>, JsonRejection>) -> Response {
    let Json(value) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(
                Error::new(ErrorKind::InvalidArgs).with_message(rejection.body_text()),
            );
        }
    };
    let reply = state.dispatcher.dispatch_value(value).await;
    match serde_json::to_value(&reply) {
        Ok(payload) => json_response(payload),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode reply")
                .with_source(err),
        ),
    }
}

fn json_response(payload: Value) -> Response {
    let mut response = Json(payload).into_response();
    response
        .headers_mut()
        .insert("channel-search-version", HeaderValue::from_static("0"));
    response
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::InvalidArgs | ErrorKind::Usage => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
        },
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("channel-search-version", HeaderValue::from_static("0"));
    response
}
