#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Iam requests submitted through the worker intake, with the resulting
//! cache state checked by the authorization evaluator.

use std::sync::Arc;
use std::time::Duration;

use iam::{IamService, IamWorker};
use perm_cache::{PermCache, catalog};
use soma_msg::{Action, Body, Category, Handler, ObjectIds, Payload, Request, Section, Worker, handler_names, proto};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Fixture {
    cache: Arc<PermCache>,
    worker: Worker,
    cancel: CancellationToken,
}

impl Fixture {
    fn new() -> Self {
        let cache = Arc::new(PermCache::new());
        for event in catalog::vocabulary() {
            cache.perform(&event).unwrap();
        }
        let cancel = CancellationToken::new();
        let worker = Worker::spawn(
            handler_names::IAM,
            16,
            IamWorker::new(IamService::new(cache.clone())),
            cancel.clone(),
        );
        Self { cache, worker, cancel }
    }

    async fn call(&self, section: Section, action: Action, payload: Payload) -> soma_msg::Reply {
        let (request, pending) = Request::new(Uuid::new_v4(), section, action);
        self.worker
            .intake()
            .send(request.with_payload(payload))
            .await
            .unwrap();
        pending.wait(Duration::from_secs(1)).await.unwrap()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn granting_through_iam_changes_authorization() {
    let fx = Fixture::new();

    let reply = fx
        .call(
            Section::Team,
            Action::Add,
            Payload::Team(proto::Team {
                name: "ops".to_owned(),
                ..proto::Team::default()
            }),
        )
        .await;
    let Some(Body::Teams(teams)) = reply.body else {
        panic!("team not returned: {:?}", reply.error);
    };
    let team_id = teams[0].id.clone();

    let reply = fx
        .call(
            Section::User,
            Action::Add,
            Payload::User(proto::User {
                user_name: "bob".to_owned(),
                team_id: team_id.clone(),
                ..proto::User::default()
            }),
        )
        .await;
    assert_eq!(reply.code, 200);

    let reply = fx
        .call(
            Section::Permission,
            Action::Add,
            Payload::Permission(proto::Permission {
                id: String::new(),
                name: "team.read".to_owned(),
                category: Category::Global,
                mappings: vec![proto::PermissionMapping {
                    section_id: catalog::section_id(Section::Team),
                    action_id: Some(catalog::action_id(Section::Team, Action::Show)),
                }],
            }),
        )
        .await;
    let Some(Body::Permissions(permissions)) = reply.body else {
        panic!("permission not returned: {:?}", reply.error);
    };

    let show_team = || {
        Request::detached(Section::Team, Action::Show, Payload::None)
            .with_author("bob")
            .with_objects(ObjectIds::default())
    };
    assert!(!fx.cache.authorize(&show_team()).is_permitted());

    let reply = fx
        .call(
            Section::Right,
            Action::Grant,
            Payload::Grant(proto::Grant {
                id: String::new(),
                recipient_type: "team".to_owned(),
                recipient_id: team_id,
                permission_id: permissions[0].id.clone(),
                category: Category::Global,
                object_type: None,
                object_id: None,
            }),
        )
        .await;
    assert_eq!(reply.code, 200, "{:?}", reply.error);
    assert!(fx.cache.authorize(&show_team()).is_permitted());
}

#[tokio::test]
async fn unknown_login_replies_404() {
    let fx = Fixture::new();
    let reply = fx
        .call(
            Section::Admin,
            Action::Show,
            Payload::User(proto::User {
                user_name: "admin_ghost".to_owned(),
                ..proto::User::default()
            }),
        )
        .await;
    assert_eq!(reply.code, 404);
    assert_eq!(reply.error.as_deref(), Some("admin not found: admin_ghost"));
}
