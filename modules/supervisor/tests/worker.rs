#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Supervisor tasks submitted through the worker intake.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use soma_msg::{Action, Handler, Request, Section, SupervisorTask, Worker, codes, handler_names, proto};
use supervisor::domain::credentials::IssuedToken;
use supervisor::{Service, SupervisorConfig, SupervisorWorker};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn spawn() -> (Worker, CancellationToken) {
    let mut tokens = BTreeMap::new();
    tokens.insert("root".to_owned(), SecretString::from("root-token"));
    let cfg = SupervisorConfig {
        tokens,
        ..SupervisorConfig::default()
    };
    let cancel = CancellationToken::new();
    let worker = Worker::spawn(
        handler_names::SUPERVISOR,
        8,
        SupervisorWorker::new(Arc::new(Service::from_config(&cfg))),
        cancel.clone(),
    );
    (worker, cancel)
}

async fn submit(worker: &Worker, request: Request, pending: soma_msg::Pending) -> soma_msg::Reply {
    worker.intake().send(request).await.unwrap();
    pending.wait(Duration::from_secs(1)).await.unwrap()
}

#[tokio::test]
async fn basic_auth_verdict_carries_user_and_token() {
    let (worker, cancel) = spawn();

    let (mut request, pending) = Request::new(Uuid::new_v4(), Section::Supervisor, Action::Authenticate);
    request.supervisor.task = SupervisorTask::BasicAuth;
    request.supervisor.user = "root".to_owned();
    request.supervisor.token = Some(SecretString::from("root-token"));
    let reply = submit(&worker, request, pending).await;

    let sup = reply.supervisor.unwrap();
    assert_eq!(sup.verdict, codes::OK);
    assert_eq!(sup.user.as_deref(), Some("root"));
    assert_eq!(sup.token.unwrap().expose_secret(), "root-token");
    cancel.cancel();
}

#[tokio::test]
async fn wrong_token_yields_401_verdict() {
    let (worker, cancel) = spawn();

    let (mut request, pending) = Request::new(Uuid::new_v4(), Section::Supervisor, Action::Authenticate);
    request.supervisor.task = SupervisorTask::BasicAuth;
    request.supervisor.user = "root".to_owned();
    request.supervisor.token = Some(SecretString::from("guess"));
    let reply = submit(&worker, request, pending).await;

    assert_eq!(reply.code, codes::UNAUTHORIZED);
    assert_eq!(reply.supervisor.unwrap().verdict, codes::UNAUTHORIZED);
    cancel.cancel();
}

#[tokio::test]
async fn kex_then_token() {
    let (worker, cancel) = spawn();

    let (mut request, pending) = Request::new(Uuid::new_v4(), Section::Supervisor, Action::Kex);
    request.supervisor.task = SupervisorTask::Kex;
    request.supervisor.kex = Some(proto::Kex {
        public_key: "00ff".to_owned(),
        initialization_vector: "a0a1".to_owned(),
        ..proto::Kex::default()
    });
    let kex = submit(&worker, request, pending).await.supervisor.unwrap().kex.unwrap();

    let (mut request, pending) = Request::new(Uuid::new_v4(), Section::Supervisor, Action::Token);
    request.supervisor.task = SupervisorTask::Token;
    request.supervisor.kex_id = kex.id;
    request.supervisor.data = br#"{"user":"root","password":"root-token"}"#.to_vec();
    let reply = submit(&worker, request, pending).await;

    assert_eq!(reply.code, codes::OK);
    let issued: IssuedToken = serde_json::from_slice(&reply.supervisor.unwrap().data).unwrap();
    assert_eq!(issued.user, "root");
    assert_eq!(issued.token.len(), 64);
    cancel.cancel();
}
