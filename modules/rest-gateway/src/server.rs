//! Router assembly and the HTTP listener.

use std::any::Any;
use std::net::SocketAddr;

use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{Request, Response};
use axum::middleware::{from_fn, from_fn_with_state};
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

use crate::context::RequestMeta;
use crate::middleware::{self, basic_auth::basic_auth};
use crate::routes;
use crate::send;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid bind address '{0}'")]
    BadAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("TLS termination is not supported by this build; put a TLS proxy in front")]
    TlsUnsupported,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = match err.downcast::<String>() {
        Ok(text) => *text,
        Err(other) => other
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_owned(), |text| (*text).to_owned()),
    };
    tracing::error!(
        panic = %message,
        backtrace = %std::backtrace::Backtrace::force_capture(),
        "request adapter panicked"
    );
    send::failure(soma_msg::codes::SERVER_ERROR, Some("internal server error".to_owned()))
}

fn request_span(req: &Request<Body>) -> tracing::Span {
    let request_id = req
        .extensions()
        .get::<RequestMeta>()
        .map(|meta| meta.id.to_string())
        .unwrap_or_default();
    tracing::info_span!(
        "http_request",
        method = %req.method(),
        uri = %req.uri().path(),
        request_id = %request_id,
        status = Empty,
        latency_ms = Empty,
    )
}

/// Builds the complete router. Layers are added innermost first.
pub fn router(state: AppState) -> Router {
    let limit = state.config.body_limit_bytes;

    let authenticated = routes::authenticated()
        .route_layer(from_fn_with_state(state.clone(), basic_auth));

    let mut router = routes::public()
        .merge(authenticated)
        .fallback(routes::unknown_route)
        .route_layer(from_fn_with_state(state.clone(), middleware::track_route));

    router = router.layer(CatchPanicLayer::custom(panic_response));
    router = router.layer(RequestBodyLimitLayer::new(limit));
    router = router.layer(DefaultBodyLimit::max(limit));
    router = router.layer(from_fn_with_state(state.clone(), middleware::mode_gate));
    router = router.layer(from_fn(middleware::intake_log));
    router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(request_span)
            .on_response(
                |res: &Response<Body>, latency: std::time::Duration, span: &tracing::Span| {
                    span.record("status", res.status().as_u16());
                    span.record("latency_ms", latency.as_millis());
                },
            ),
    );
    router = router.layer(from_fn(middleware::enrich));
    router = router.layer(from_fn_with_state(state.clone(), middleware::check_shutdown));

    router.with_state(state)
}

/// Serves until `cancel` fires. New requests are refused with 503 from the
/// moment of cancellation; requests in flight run to completion.
///
/// # Errors
/// A bad or unbindable address, a TLS configuration, or an I/O failure of
/// the listener.
pub async fn serve(state: AppState, cancel: CancellationToken) -> Result<(), ServerError> {
    if state.config.tls.enabled {
        return Err(ServerError::TlsUnsupported);
    }
    let addr: SocketAddr = state
        .config
        .bind_addr
        .parse()
        .map_err(|_| ServerError::BadAddress(state.config.bind_addr.clone()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(%addr, mode = state.config.mode().as_str(), "HTTP server bound");

    let shutdown = {
        let state = state.clone();
        async move {
            cancel.cancelled().await;
            state.begin_shutdown();
            tracing::info!("HTTP server shutting down gracefully");
        }
    };

    let app = router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
