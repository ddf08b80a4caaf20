use axum::extract::State;
use axum::response::{IntoResponse, Response};
use soma_msg::{Action, ObjectIds, Payload, Section};

use crate::adapter::{Call, dispatch};
use crate::context::{Caller, RequestMeta};
use crate::dto::{JsonBody, require};
use crate::send;
use crate::state::AppState;

/// `POST /system/`: the operation name in the body selects the action.
/// Names outside the administrative set are refused like a denied request.
pub async fn operation(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let op = match require(body.system, "system") {
        Ok(op) => op,
        Err(err) => return err.into_response(),
    };
    let action = match op.request.parse::<Action>() {
        Ok(action) if action.is_system_operation() => action,
        _ => {
            tracing::info!(operation = %op.request, "unknown system operation");
            return send::masked();
        }
    };
    let objects = ObjectIds {
        repository: Some(op.repository_id.clone()),
        ..ObjectIds::default()
    };
    let call = Call::new(Section::System, action)
        .objects(objects)
        .payload(Payload::System(op));
    dispatch(&state, &meta, &caller, call).await
}
