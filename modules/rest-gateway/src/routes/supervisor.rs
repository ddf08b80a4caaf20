//! Supervisor endpoints.
//!
//! Bodies of the token, password and activation calls are opaque to the
//! gateway and travel unchanged. None of these routes is authorized: the
//! supervisor is the authority for credentials.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use soma_msg::{Action, Request, Section, SupervisorTask, proto};

use crate::adapter::{respond_masked, submit};
use crate::context::{Caller, RequestMeta};
use crate::send;
use crate::state::AppState;

fn envelope(meta: &RequestMeta, action: Action, task: SupervisorTask) -> (Request, soma_msg::Pending) {
    let (mut request, pending) = Request::new(meta.id, Section::Supervisor, action);
    request.supervisor.task = task;
    let request = request.with_origin(meta.remote_addr.as_str(), meta.uri.as_str());
    (request, pending)
}

pub async fn kex(
    State(state): State<AppState>,
    meta: RequestMeta,
    body: Result<Json<proto::Kex>, JsonRejection>,
) -> Response {
    // Unreadable key material is answered like any refused exchange.
    let Ok(Json(client)) = body else {
        return send::masked();
    };
    let (mut request, pending) = envelope(&meta, Action::Kex, SupervisorTask::Kex);
    request.supervisor.kex = Some(client);
    respond_masked(submit(&state, request, pending).await)
}

async fn encrypted(
    state: &AppState,
    meta: &RequestMeta,
    kex_id: String,
    data: &Bytes,
    action: Action,
    task: SupervisorTask,
) -> Response {
    let (mut request, pending) = envelope(meta, action, task);
    request.supervisor.kex_id = kex_id;
    request.supervisor.data = data.to_vec();
    respond_masked(submit(state, request, pending).await)
}

pub async fn request_token(
    State(state): State<AppState>,
    meta: RequestMeta,
    Path(kex_id): Path<String>,
    data: Bytes,
) -> Response {
    encrypted(&state, &meta, kex_id, &data, Action::Token, SupervisorTask::Token).await
}

pub async fn change_password(
    State(state): State<AppState>,
    meta: RequestMeta,
    Path(kex_id): Path<String>,
    data: Bytes,
) -> Response {
    encrypted(&state, &meta, kex_id, &data, Action::Password, SupervisorTask::Password).await
}

pub async fn activate(
    State(state): State<AppState>,
    meta: RequestMeta,
    Path(kex_id): Path<String>,
    data: Bytes,
) -> Response {
    encrypted(&state, &meta, kex_id, &data, Action::Activate, SupervisorTask::Activate).await
}

/// Drops the token the caller authenticated with.
pub async fn invalidate(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    let (request, pending) = envelope(&meta, Action::Invalidate, SupervisorTask::Invalidate);
    let mut request = request.with_author(caller.user.as_str());
    request.supervisor.user = caller.user;
    request.supervisor.token = Some(caller.token);
    respond_masked(submit(&state, request, pending).await)
}
