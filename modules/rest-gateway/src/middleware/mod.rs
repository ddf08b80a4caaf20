//! Request-wrapping middleware.
//!
//! Outermost to innermost: [`check_shutdown`], [`enrich`], the trace
//! layer, [`intake_log`], [`mode_gate`]; authenticated routes add
//! [`basic_auth::basic_auth`] right above the adapter.

pub mod basic_auth;

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::config::Mode;
use crate::context::{RequestMeta, with_request_id};
use crate::error::RestError;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 503 without a body once shutdown has begun; otherwise counts the
/// request and times it.
pub async fn check_shutdown(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.is_shutting_down() {
        state.metrics.record_refused();
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    state.metrics.record_request();
    let started = Instant::now();
    let resp = next.run(req).await;
    state.metrics.observe_latency(started.elapsed());
    resp
}

/// Assigns a fresh request id and records it with the URI and peer.
pub async fn enrich(mut req: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.to_string());
    let uri = req.uri().to_string();
    req.extensions_mut().insert(RequestMeta {
        id,
        uri,
        remote_addr,
    });

    let mut resp = with_request_id(id, next.run(req)).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    resp
}

/// Structured record of every request, written before authentication.
pub async fn intake_log(req: Request, next: Next) -> Response {
    if let Some(meta) = req.extensions().get::<RequestMeta>() {
        tracing::info!(
            request_id = %meta.id,
            method = %req.method(),
            uri = %meta.uri,
            remote_addr = %meta.remote_addr,
            user_agent = req
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-"),
            "request received"
        );
    }
    next.run(req).await
}

/// Whether `mode` refuses `method` on `path`.
#[must_use]
pub fn refuses(mode: Mode, method: &Method, path: &str) -> bool {
    if mode == Mode::Normal || method == Method::GET || method == Method::HEAD {
        return false;
    }
    if method == Method::POST && path.starts_with("/search/") {
        return false;
    }
    let key_exchange = path == "/kex/";
    let supervisor =
        key_exchange || path.starts_with("/tokens/") || path.starts_with("/accounts/");
    match mode {
        Mode::ReadOnly => !supervisor,
        Mode::Observer => !key_exchange,
        Mode::Normal => false,
    }
}

/// Answers 503 to writes while the service runs read-only or as observer.
pub async fn mode_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mode = state.config.mode();
    if refuses(mode, req.method(), req.uri().path()) {
        tracing::debug!(mode = mode.as_str(), method = %req.method(), "write refused");
        return RestError::ModeRefused(mode.as_str()).into_response();
    }
    next.run(req).await
}

/// Per-route request counter, keyed by method and route template.
pub async fn track_route(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(path) = req.extensions().get::<MatchedPath>() {
        state
            .metrics
            .record_route(&format!("{} {}", req.method(), path.as_str()));
    }
    next.run(req).await
}
