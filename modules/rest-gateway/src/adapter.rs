//! Route adapters: envelope, authorize, dispatch, await, serialize.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use soma_msg::{Action, ObjectIds, Payload, Pending, Reply, Request, Section, codes};
use tracing::{debug, info};

use crate::context::{Caller, RequestMeta};
use crate::error::RestError;
use crate::send::{masked, send_reply};
use crate::state::AppState;

/// One operation as read from the URL and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub section: Section,
    pub action: Action,
    pub payload: Payload,
    pub objects: ObjectIds,
}

impl Call {
    #[must_use]
    pub fn new(section: Section, action: Action) -> Self {
        Self {
            section,
            action,
            payload: Payload::None,
            objects: ObjectIds::default(),
        }
    }

    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn objects(mut self, objects: ObjectIds) -> Self {
        self.objects = objects;
        self
    }
}

/// Builds the envelope for an authenticated caller.
#[must_use]
pub fn envelope(meta: &RequestMeta, caller: &Caller, call: Call) -> (Request, Pending) {
    let (request, pending) = Request::new(meta.id, call.section, call.action);
    let request = request
        .with_author(caller.user.as_str())
        .with_payload(call.payload)
        .with_objects(call.objects)
        .with_origin(meta.remote_addr.as_str(), meta.uri.as_str());
    (request, pending)
}

/// Runs the authorization evaluator on the request's authorization block
/// and keeps its audit trail on the envelope.
///
/// # Errors
/// [`RestError::Forbidden`] on a Deny verdict.
pub fn authorize(state: &AppState, request: &mut Request) -> Result<(), RestError> {
    if state.config.open_instance {
        return Ok(());
    }
    let decision = state.cache.authorize(request);
    let permitted = decision.is_permitted();
    request.audit.extend(decision.audit);
    if permitted {
        return Ok(());
    }
    let trail: Vec<String> = request
        .audit
        .entries()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    info!(
        parent: &request.log,
        subject = %request.auth.subject,
        section = %request.auth.section,
        action = %request.auth.action,
        audit = ?trail,
        "request denied"
    );
    Err(RestError::Forbidden)
}

/// Hands the envelope to its handler and waits for the reply.
///
/// # Errors
/// 501 for tuples no handler serves, 503 when the handler is missing or
/// does not answer within the configured deadline.
pub async fn submit(state: &AppState, request: Request, pending: Pending) -> Result<Reply, RestError> {
    let intake = state.handlers.must_lookup(&request)?;
    debug!(parent: &request.log, "dispatching request");
    intake
        .send(request)
        .await
        .map_err(|_| RestError::Unavailable("handler intake is closed".to_owned()))?;
    Ok(pending.wait(state.config.request_timeout).await?)
}

/// The common adapter: envelope, authorize, dispatch, serialize.
pub async fn dispatch(state: &AppState, meta: &RequestMeta, caller: &Caller, call: Call) -> Response {
    let (mut request, pending) = envelope(meta, caller, call);
    if let Err(err) = authorize(state, &mut request) {
        return err.into_response();
    }
    respond(submit(state, request, pending).await)
}

/// Serializes a reply, or the error that prevented one.
#[must_use]
pub fn respond(result: Result<Reply, RestError>) -> Response {
    match result {
        Ok(reply) => send_reply(reply),
        Err(err) => {
            if err.code() >= 500 {
                tracing::error!(error = %err, "request not served");
            }
            err.into_response()
        }
    }
}

/// [`respond`] for supervisor calls: a call that got no reply answers a
/// bodiless 503 when the handler was unavailable, else a bodiless 403.
#[must_use]
pub fn respond_masked(result: Result<Reply, RestError>) -> Response {
    match result {
        Ok(reply) => send_reply(reply),
        Err(err) => {
            tracing::error!(error = %err, "supervisor request not served");
            if err.code() == codes::UNAVAILABLE {
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            } else {
                masked()
            }
        }
    }
}
