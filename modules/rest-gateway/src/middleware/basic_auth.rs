//! HTTP Basic authentication against the supervisor.
//!
//! The gateway never sees stored credentials: it forwards the presented
//! user and token in a `supervisor`/`authenticate` envelope and trusts
//! the verdict.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use soma_msg::{Action, Section, SupervisorTask, codes, handler_names};
use uuid::Uuid;

use crate::context::Caller;
use crate::error::RestError;
use crate::state::AppState;

/// Login attached in open-instance mode.
pub const ANONYMOUS: &str = "anonymous";

/// Splits an `Authorization: Basic ...` header into user and token.
#[must_use]
pub fn parse_basic(headers: &HeaderMap) -> Option<(String, SecretString)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, token) = text.split_once(':')?;
    if user.is_empty() || token.is_empty() {
        return None;
    }
    Some((user.to_owned(), SecretString::from(token)))
}

pub async fn basic_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(supervisor) = state.handlers.get(handler_names::SUPERVISOR) else {
        tracing::error!("no authentication handler registered");
        return RestError::Unavailable("authentication handler unavailable".to_owned())
            .into_response();
    };

    if state.config.open_instance {
        req.extensions_mut().insert(Caller {
            user: ANONYMOUS.to_owned(),
            token: SecretString::from(""),
        });
        return next.run(req).await;
    }

    let Some((presented, token)) = parse_basic(req.headers()) else {
        return RestError::Unauthenticated.into_response();
    };

    let (mut envelope, pending) =
        soma_msg::Request::new(Uuid::new_v4(), Section::Supervisor, Action::Authenticate);
    envelope.supervisor.task = SupervisorTask::BasicAuth;
    envelope.supervisor.user.clone_from(&presented);
    envelope.supervisor.token = Some(token);

    if supervisor.intake().send(envelope).await.is_err() {
        return RestError::Unavailable("authentication handler unavailable".to_owned())
            .into_response();
    }
    let reply = match pending.wait(state.config.request_timeout).await {
        Ok(reply) => reply,
        Err(err) => return RestError::from(err).into_response(),
    };

    let confirmed = reply
        .supervisor
        .filter(|s| s.verdict == codes::OK)
        .and_then(|s| Some((s.user?, s.token?)));
    let Some((user, token)) = confirmed else {
        tracing::info!(user = %presented, "basic authentication rejected");
        return RestError::Unauthenticated.into_response();
    };

    req.extensions_mut().insert(Caller { user, token });
    next.run(req).await
}
