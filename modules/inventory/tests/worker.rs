#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Inventory requests through the worker: reply codes, job ids and
//! priority handling of system operations.

use std::sync::Arc;
use std::time::Duration;

use inventory::{InventoryService, InventoryWorker};
use perm_cache::PermCache;
use soma_msg::{Action, Body, Handler, HandlerMap, Payload, Request, Section, Worker, codes, handler_names, proto};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn spawn() -> (Arc<Worker>, CancellationToken) {
    let cache = Arc::new(PermCache::new());
    cache
        .apply(
            Section::Team,
            Action::Add,
            &Payload::Team(proto::Team {
                id: "t1".to_owned(),
                name: "ops".to_owned(),
                members: vec![],
            }),
        )
        .unwrap();
    let cancel = CancellationToken::new();
    let worker = Worker::spawn(
        handler_names::INVENTORY,
        16,
        InventoryWorker::new(InventoryService::new(cache)),
        cancel.clone(),
    );
    (Arc::new(worker), cancel)
}

async fn call(worker: &Worker, section: Section, action: Action, payload: Payload) -> soma_msg::Reply {
    let (request, pending) = Request::new(Uuid::new_v4(), section, action);
    worker.intake().send(request.with_payload(payload)).await.unwrap();
    pending.wait(Duration::from_secs(1)).await.unwrap()
}

#[tokio::test]
async fn tree_writes_reply_202_with_job_id() {
    let (worker, cancel) = spawn();
    let reply = call(
        &worker,
        Section::Repository,
        Action::Create,
        Payload::Repository(proto::Repository {
            name: "alpha".to_owned(),
            team_id: "t1".to_owned(),
            ..proto::Repository::default()
        }),
    )
    .await;
    assert_eq!(reply.code, codes::ACCEPTED);
    assert!(Uuid::parse_str(reply.job_id.as_deref().unwrap()).is_ok());

    let Some(Body::Repositories(repositories)) = reply.body else {
        panic!("repository not returned");
    };
    let reply = call(
        &worker,
        Section::Repository,
        Action::Destroy,
        Payload::Repository(repositories[0].clone()),
    )
    .await;
    assert_eq!(reply.code, codes::OK);
    assert!(reply.job_id.is_none());
    cancel.cancel();
}

#[tokio::test]
async fn system_operations_use_the_priority_intake() {
    let (worker, cancel) = spawn();
    let reply = call(
        &worker,
        Section::Repository,
        Action::Create,
        Payload::Repository(proto::Repository {
            id: "r1".to_owned(),
            name: "alpha".to_owned(),
            team_id: "t1".to_owned(),
            is_active: true,
        }),
    )
    .await;
    assert_eq!(reply.code, codes::ACCEPTED);

    let mut registry = HandlerMap::new();
    registry.add(worker.clone());

    let (request, pending) = Request::new(Uuid::new_v4(), Section::System, Action::RestartRepository);
    let request = request.with_payload(Payload::System(proto::SystemOperation {
        request: "restart-repository".to_owned(),
        repository_id: "r1".to_owned(),
    }));
    let intake = registry.must_lookup(&request).unwrap();
    intake.send(request).await.unwrap();
    let reply = pending.wait(Duration::from_secs(1)).await.unwrap();
    assert_eq!(reply.code, codes::OK);
    assert!(matches!(reply.body, Some(Body::System(ops)) if ops[0].repository_id == "r1"));
    cancel.cancel();
}

#[tokio::test]
async fn unknown_bucket_is_404() {
    let (worker, cancel) = spawn();
    let reply = call(
        &worker,
        Section::Cluster,
        Action::List,
        Payload::Cluster(proto::Cluster {
            bucket_id: "b-missing".to_owned(),
            ..proto::Cluster::default()
        }),
    )
    .await;
    assert_eq!(reply.code, codes::NOT_FOUND);
    assert_eq!(reply.error.as_deref(), Some("bucket not found: b-missing"));
    cancel.cancel();
}
