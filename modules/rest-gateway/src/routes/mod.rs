//! Route table.
//!
//! Public routes carry the ping and the encrypted supervisor endpoints;
//! everything else sits behind basic authentication.

mod iam;
mod inventory;
mod supervisor;
mod system;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, head, patch, post, put};

use crate::error::RestError;
use crate::state::AppState;

pub const POWERED_BY: &str = "SOMA Configuration System";

async fn ping(State(state): State<AppState>) -> Response {
    let header = |name: &'static str, value: &str| {
        HeaderValue::from_str(value)
            .ok()
            .map(|v| (HeaderName::from_static(name), v))
    };
    let mut resp = StatusCode::NO_CONTENT.into_response();
    let headers = [
        header("x-powered-by", POWERED_BY),
        header("x-version", &state.config.version),
        header("x-soma-mode", state.config.mode().as_str()),
    ];
    resp.headers_mut().extend(headers.into_iter().flatten());
    resp
}

/// Succeeds for every caller that got past basic authentication.
async fn validate() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn unknown_route() -> RestError {
    RestError::not_found("route", "no such endpoint")
}

pub fn public() -> Router<AppState> {
    Router::new()
        .route("/", head(ping))
        .route("/kex/", post(supervisor::kex))
        .route("/tokens/request/{kex_id}", put(supervisor::request_token))
        .route("/accounts/password/{kex_id}", patch(supervisor::change_password))
        .route("/accounts/activate/user/{kex_id}", put(supervisor::activate))
}

pub fn authenticated() -> Router<AppState> {
    Router::new()
        .route("/authenticate/validate", head(validate))
        .route("/tokens/self/active", delete(supervisor::invalidate))
        .route("/system/", post(system::operation))
        .merge(iam::routes())
        .merge(inventory::routes())
}
