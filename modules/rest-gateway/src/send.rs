//! Result serializer: turns a handler [`Reply`] into the HTTP response.
//!
//! Regular replies share one JSON shape:
//!
//! ```json
//! { "requestId": "...", "statusCode": 200, "statusText": "OK", "repositories": [ ... ] }
//! ```
//!
//! `errors` appears only on failures and `jobId` only on 202. Supervisor
//! and system replies are masked: whatever is not an explicit success
//! becomes a bodiless 403.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use soma_msg::{Action, Body, Reply, Section, codes};

use crate::context::current_request_id;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    request_id: String,
    status_code: u16,
    status_text: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<String>,
    #[serde(flatten)]
    entity: Map<String, Value>,
}

impl Envelope {
    fn new(request_id: String, code: u16) -> Self {
        Self {
            request_id,
            status_code: code,
            status_text: status_text(code).unwrap_or("ServerError"),
            errors: Vec::new(),
            job_id: None,
            entity: Map::new(),
        }
    }

    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Status text of the codes the serializer emits; `None` for anything else.
#[must_use]
pub const fn status_text(code: u16) -> Option<&'static str> {
    let text = match code {
        codes::OK => "OK",
        codes::ACCEPTED => "Accepted",
        codes::BAD_REQUEST => "BadRequest",
        codes::UNAUTHORIZED => "Unauthorized",
        codes::FORBIDDEN => "Forbidden",
        codes::NOT_FOUND => "NotFound",
        codes::CONFLICT => "Conflict",
        codes::SERVER_ERROR => "ServerError",
        codes::NOT_IMPLEMENTED => "NotImplemented",
        codes::UNAVAILABLE => "ServiceUnavailable",
        _ => return None,
    };
    Some(text)
}

/// Envelope for a failure raised outside any handler.
#[must_use]
pub fn failure(code: u16, error: Option<String>) -> Response {
    let request_id = current_request_id().map(|id| id.to_string()).unwrap_or_default();
    let code = if status_text(code).is_some() {
        code
    } else {
        codes::SERVER_ERROR
    };
    let mut envelope = Envelope::new(request_id, code);
    envelope.errors.extend(error);
    envelope.into_response()
}

/// Name of the result field and its JSON value.
fn entity(body: &Body) -> Result<(&'static str, Value), serde_json::Error> {
    use serde_json::to_value;

    Ok(match body {
        Body::Categories(v) => ("categories", to_value(v)?),
        Body::Sections(v) => ("sections", to_value(v)?),
        Body::Actions(v) => ("actions", to_value(v)?),
        Body::Permissions(v) => ("permissions", to_value(v)?),
        Body::Grants(v) => ("grants", to_value(v)?),
        Body::Teams(v) => ("teams", to_value(v)?),
        Body::Users(v) => ("users", to_value(v)?),
        Body::Repositories(v) => ("repositories", to_value(v)?),
        Body::Buckets(v) => ("buckets", to_value(v)?),
        Body::Clusters(v) => ("clusters", to_value(v)?),
        Body::Groups(v) => ("groups", to_value(v)?),
        Body::Nodes(v) => ("nodes", to_value(v)?),
        Body::NodeConfigs(v) => ("nodeConfigs", to_value(v)?),
        Body::Monitorings(v) => ("monitorings", to_value(v)?),
        Body::System(v) => ("systemOperations", to_value(v)?),
        Body::Tree(t) => ("tree", to_value(t)?),
    })
}

/// Converts a handler reply into the HTTP response.
#[must_use]
pub fn send_reply(reply: Reply) -> Response {
    if let Some(error) = &reply.error {
        tracing::error!(
            request_id = %reply.request_id,
            section = %reply.section,
            action = %reply.action,
            code = reply.code,
            error = %error,
            "request failed"
        );
    }
    match reply.section {
        Section::Supervisor => supervisor(reply),
        Section::System => system(reply),
        _ => regular(reply),
    }
}

fn regular(reply: Reply) -> Response {
    let request_id = reply.request_id.to_string();
    if status_text(reply.code).is_none() {
        tracing::warn!(
            request_id = %request_id,
            code = reply.code,
            "handler replied with an unknown code, answering 500"
        );
        return Envelope::new(request_id, codes::SERVER_ERROR).into_response();
    }

    let mut envelope = Envelope::new(request_id, reply.code);
    if !reply.is_success() {
        envelope.errors.extend(reply.error);
        return envelope.into_response();
    }

    if reply.code == codes::ACCEPTED {
        envelope.job_id = reply.job_id;
    }
    if let Some(body) = &reply.body {
        match entity(body) {
            Ok((field, value)) => {
                envelope.entity.insert(field.to_owned(), value);
            }
            Err(err) => {
                tracing::error!(request_id = %envelope.request_id, error = %err, "result encoding failed");
                let mut failed = Envelope::new(envelope.request_id, codes::SERVER_ERROR);
                failed.errors.push("result encoding failed".to_owned());
                return failed.into_response();
            }
        }
    }
    envelope.into_response()
}

/// Bodiless 403 for refused supervisor and system calls.
#[must_use]
pub fn masked() -> Response {
    StatusCode::FORBIDDEN.into_response()
}

fn supervisor(reply: Reply) -> Response {
    let verdict = reply.supervisor.as_ref().map_or(reply.code, |s| s.verdict);
    match (reply.action, verdict) {
        (Action::Kex, codes::OK) => match reply.supervisor.as_ref().and_then(|s| s.kex.as_ref()) {
            Some(kex) => (StatusCode::OK, Json(kex)).into_response(),
            None => masked(),
        },
        (Action::Token | Action::Password | Action::Activate, codes::OK) => {
            let data = reply.supervisor.map(|s| s.data).unwrap_or_default();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM))],
                data,
            )
                .into_response()
        }
        (Action::Activate, codes::NOT_ACCEPTABLE) => {
            let mut envelope = Envelope::new(reply.request_id.to_string(), codes::CONFLICT);
            envelope.errors.extend(reply.error);
            envelope.into_response()
        }
        (Action::Invalidate, codes::OK) => {
            Envelope::new(reply.request_id.to_string(), codes::OK).into_response()
        }
        _ => masked(),
    }
}

fn system(reply: Reply) -> Response {
    if reply.action.is_system_operation() && reply.code == codes::OK {
        regular(reply)
    } else {
        masked()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use soma_msg::{Payload, Request, SupervisorReply, proto};

    async fn json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn reply(section: Section, action: Action) -> Reply {
        Reply::for_request(&Request::detached(section, action, Payload::None))
    }

    #[tokio::test]
    async fn success_carries_entity_and_drops_error() {
        let mut r = reply(Section::Team, Action::List).ok(Some(Body::Teams(vec![proto::Team {
            id: "t1".to_owned(),
            name: "ops".to_owned(),
            members: vec![],
        }])));
        r.error = Some("stale read".to_owned());

        let resp = send_reply(r);
        assert_eq!(resp.status(), StatusCode::OK);
        let v = json(resp).await;
        assert_eq!(v["statusText"], "OK");
        assert_eq!(v["teams"][0]["id"], "t1");
        assert!(v.get("errors").is_none());
    }

    #[tokio::test]
    async fn accepted_carries_job_id() {
        let r = reply(Section::Bucket, Action::Create).accepted("job-1", None);
        let resp = send_reply(r);
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(json(resp).await["jobId"], "job-1");
    }

    #[tokio::test]
    async fn unknown_code_is_scrubbed_to_500() {
        let mut r = reply(Section::Team, Action::List).ok(Some(Body::Teams(vec![])));
        r.code = 418;
        let resp = send_reply(r);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = json(resp).await;
        assert!(v.get("teams").is_none());
        assert_eq!(v["statusCode"], 500);
    }

    #[tokio::test]
    async fn failure_lists_the_error() {
        let r = reply(Section::Team, Action::Show).not_found("team not found: t9");
        let resp = send_reply(r);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(resp).await["errors"][0], "team not found: t9");
    }

    #[tokio::test]
    async fn supervisor_failures_are_masked() {
        let r = reply(Section::Supervisor, Action::Token)
            .fail(401, "bad credentials")
            .with_supervisor(SupervisorReply {
                verdict: 401,
                ..SupervisorReply::default()
            });
        let resp = send_reply(r);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(resp.headers().get(header::CONTENT_TYPE).is_none());
        assert!(to_bytes(resp.into_body(), usize::MAX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn supervisor_success_is_opaque_bytes() {
        let r = reply(Section::Supervisor, Action::Token)
            .ok(None)
            .with_supervisor(SupervisorReply {
                verdict: 200,
                data: b"ciphertext".to_vec(),
                ..SupervisorReply::default()
            });
        let resp = send_reply(r);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], OCTET_STREAM);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ciphertext");
    }

    #[tokio::test]
    async fn activation_policy_violation_surfaces_as_conflict() {
        let r = reply(Section::Supervisor, Action::Activate)
            .fail(406, "password must be at least 12 characters long")
            .with_supervisor(SupervisorReply {
                verdict: 406,
                ..SupervisorReply::default()
            });
        let resp = send_reply(r);
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(
            json(resp).await["errors"][0],
            "password must be at least 12 characters long"
        );
    }

    #[tokio::test]
    async fn kex_is_raw_json() {
        let r = reply(Section::Supervisor, Action::Kex)
            .ok(None)
            .with_supervisor(SupervisorReply {
                verdict: 200,
                kex: Some(proto::Kex {
                    id: "k1".to_owned(),
                    public_key: "aa".to_owned(),
                    initialization_vector: "bb".to_owned(),
                    valid_until: None,
                }),
                ..SupervisorReply::default()
            });
        let v = json(send_reply(r)).await;
        assert_eq!(v["id"], "k1");
        assert!(v.get("statusCode").is_none());
    }

    #[tokio::test]
    async fn failed_system_operation_is_masked() {
        let r = reply(Section::System, Action::StopRepository).not_found("repository not found: r9");
        let resp = send_reply(r);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(to_bytes(resp.into_body(), usize::MAX).await.unwrap().is_empty());

        let r = reply(Section::System, Action::List).ok(None);
        assert_eq!(send_reply(r).status(), StatusCode::FORBIDDEN);
    }
}
