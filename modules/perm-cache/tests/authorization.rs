#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Authorization properties of the permission cache.
//!
//! Every test starts from the built-in vocabulary and replays a small
//! seed through the same update path the running server uses.

use std::sync::Arc;

use perm_cache::catalog::{self, action_id, section_id, system_permission_id};
use perm_cache::{AUTHORIZE_KEY, OMNIPOTENCE_ID, PermCache, Scope};
use soma_msg::{Action, Category, ObjectIds, Payload, Request, Section, proto};
use tracing_test::traced_test;

struct Seed {
    cache: PermCache,
}

impl Seed {
    fn new() -> Self {
        let cache = PermCache::new();
        for event in catalog::vocabulary() {
            cache.perform(&event).unwrap();
        }
        Self { cache }
    }

    fn apply(&self, section: Section, action: Action, payload: Payload) -> &Self {
        self.cache
            .perform(&Request::cache_update(section, action, payload))
            .unwrap();
        self
    }

    fn team(&self, id: &str) -> &Self {
        self.apply(
            Section::Team,
            Action::Add,
            Payload::Team(proto::Team {
                id: id.to_owned(),
                name: format!("team-{id}"),
                members: vec![],
            }),
        )
    }

    fn login(&self, section: Section, id: &str, name: &str, team: &str) -> &Self {
        self.apply(
            section,
            Action::Add,
            Payload::User(proto::User {
                id: id.to_owned(),
                user_name: name.to_owned(),
                team_id: team.to_owned(),
                is_active: true,
                is_deleted: false,
            }),
        )
    }

    fn repository(&self, id: &str, team: &str) -> &Self {
        self.apply(
            Section::Repository,
            Action::Create,
            Payload::Repository(proto::Repository {
                id: id.to_owned(),
                name: format!("repo-{id}"),
                team_id: team.to_owned(),
                is_active: true,
            }),
        )
    }

    fn bucket(&self, id: &str, repository: &str) -> &Self {
        self.apply(
            Section::Bucket,
            Action::Create,
            Payload::Bucket(proto::Bucket {
                id: id.to_owned(),
                name: format!("bucket-{id}"),
                repository_id: repository.to_owned(),
                environment: "production".to_owned(),
            }),
        )
    }

    fn cluster(&self, id: &str, bucket: &str) -> &Self {
        self.apply(
            Section::Cluster,
            Action::Create,
            Payload::Cluster(proto::Cluster {
                id: id.to_owned(),
                name: format!("cluster-{id}"),
                bucket_id: bucket.to_owned(),
            }),
        )
    }

    fn permission(&self, id: &str, name: &str, category: Category, mappings: Vec<proto::PermissionMapping>) -> &Self {
        self.apply(
            Section::Permission,
            Action::Add,
            Payload::Permission(proto::Permission {
                id: id.to_owned(),
                name: name.to_owned(),
                category,
                mappings,
            }),
        )
    }

    fn grant(&self, id: &str, kind: &str, subject: &str, permission: &str, category: Category, object: Option<&str>) -> &Self {
        self.apply(
            Section::Right,
            Action::Grant,
            Payload::Grant(proto::Grant {
                id: id.to_owned(),
                recipient_type: kind.to_owned(),
                recipient_id: subject.to_owned(),
                permission_id: permission.to_owned(),
                category,
                object_type: None,
                object_id: object.map(str::to_owned),
            }),
        )
    }

    fn permits(&self, subject: &str, section: Section, action: Action, objects: ObjectIds) -> bool {
        let request = Request::detached(section, action, Payload::None)
            .with_author(subject)
            .with_objects(objects);
        self.cache.authorize(&request).is_permitted()
    }
}

fn action_mapping(section: Section, action: Action) -> proto::PermissionMapping {
    proto::PermissionMapping {
        section_id: section_id(section),
        action_id: Some(action_id(section, action)),
    }
}

fn section_mapping(section: Section) -> proto::PermissionMapping {
    proto::PermissionMapping {
        section_id: section_id(section),
        action_id: None,
    }
}

fn objects(repository: Option<&str>, bucket: Option<&str>, cluster: Option<&str>) -> ObjectIds {
    ObjectIds {
        repository: repository.map(str::to_owned),
        bucket: bucket.map(str::to_owned),
        cluster: cluster.map(str::to_owned),
        ..ObjectIds::default()
    }
}

/// User `u2` with `bucket.read` on bucket `b1` of repository `r1`.
fn bucket_reader() -> Seed {
    let seed = Seed::new();
    seed.team("t1")
        .login(Section::User, "u2", "bob", "t1")
        .repository("r1", "t1")
        .bucket("b1", "r1")
        .bucket("b2", "r1")
        .cluster("c1", "b1")
        .permission(
            "p-bucket-read",
            "bucket.read",
            Category::Repository,
            vec![
                action_mapping(Section::Bucket, Action::Show),
                action_mapping(Section::Cluster, Action::Show),
                action_mapping(Section::Bucket, Action::List),
            ],
        )
        .grant("g1", "user", "u2", "p-bucket-read", Category::Repository, Some("b1"));
    seed
}

#[test]
fn omnipotence_dominates_every_tuple() {
    let seed = Seed::new();
    seed.team("t1")
        .login(Section::User, "u1", "root", "t1")
        .grant("g-omni", "user", "u1", OMNIPOTENCE_ID, Category::Omnipotence, None);

    for (section, _, actions) in catalog::SECTIONS {
        for action in *actions {
            assert!(
                seed.permits("root", *section, *action, ObjectIds::default()),
                "{section}::{action} denied for omnipotent subject"
            );
        }
    }
}

#[test]
fn omnipotence_follows_permission_of_that_name() {
    let seed = Seed::new();
    seed.team("t1")
        .login(Section::User, "u1", "root", "t1")
        .permission("p-omni", "omnipotence", Category::Omnipotence, vec![])
        .grant("g1", "user", "u1", "p-omni", Category::Omnipotence, None);
    assert!(seed.permits("root", Section::Repository, Action::Show, ObjectIds::default()));
}

#[test]
fn system_permission_dominates_within_its_category() {
    let seed = Seed::new();
    seed.login(Section::Admin, "a1", "admin_ops", "")
        .grant(
            "g-sys",
            "admin",
            "a1",
            &system_permission_id(Category::Repository),
            Category::System,
            None,
        );

    for (section, category, actions) in catalog::SECTIONS {
        for action in *actions {
            let permitted = seed.permits("admin_ops", *section, *action, ObjectIds::default());
            assert_eq!(
                permitted,
                *category == Category::Repository,
                "{section}::{action} in category {category}"
            );
        }
    }
    assert!(!seed.permits("admin_ops", Section::Category, Action::Remove, ObjectIds::default()));
}

#[test]
fn bucket_grant_authorizes_that_bucket_only() {
    let seed = bucket_reader();
    assert!(seed.permits("bob", Section::Bucket, Action::Show, objects(Some("r1"), Some("b1"), None)));
    assert!(!seed.permits("bob", Section::Bucket, Action::Show, objects(Some("r1"), Some("b2"), None)));
}

#[test]
fn cluster_resolves_to_granted_bucket() {
    let seed = bucket_reader();
    assert!(seed.permits(
        "bob",
        Section::Cluster,
        Action::Show,
        objects(Some("r1"), Some("b1"), Some("c1"))
    ));
    // A forged bucket id in the URL does not beat the tree.
    seed.bucket("b3", "r1").cluster("c3", "b3");
    assert!(!seed.permits(
        "bob",
        Section::Cluster,
        Action::Show,
        objects(Some("r1"), Some("b1"), Some("c3"))
    ));
}

#[test]
fn repository_grant_covers_its_buckets() {
    let seed = bucket_reader();
    seed.grant("g2", "user", "u2", "p-bucket-read", Category::Repository, Some("r1"));
    assert!(seed.permits("bob", Section::Bucket, Action::Show, objects(Some("r1"), Some("b2"), None)));
}

#[test]
fn list_accepts_a_grant_on_any_object() {
    let seed = bucket_reader();
    assert!(seed.permits("bob", Section::Bucket, Action::List, objects(Some("r9"), None, None)));
}

#[test]
fn team_grant_is_inherited_by_users_only() {
    let seed = Seed::new();
    seed.team("t2")
        .login(Section::User, "u3", "carol", "t2")
        .login(Section::Admin, "ax", "admin_x", "t2")
        .repository("r3", "t2")
        .permission(
            "p-bucket-write",
            "bucket.write",
            Category::Repository,
            vec![section_mapping(Section::Bucket)],
        )
        .grant("g5", "team", "t2", "p-bucket-write", Category::Repository, Some("r3"));

    let create = || objects(Some("r3"), None, None);
    assert!(seed.permits("carol", Section::Bucket, Action::Create, create()));
    assert!(!seed.permits("admin_x", Section::Bucket, Action::Create, create()));

    let request = Request::detached(Section::Bucket, Action::Create, Payload::None)
        .with_author("admin_x")
        .with_objects(create());
    let decision = seed.cache.authorize(&request);
    assert_eq!(decision.audit.get(AUTHORIZE_KEY), Some("NoTeamInheritance"));

    seed.apply(
        Section::Team,
        Action::Remove,
        Payload::Team(proto::Team {
            id: "t2".to_owned(),
            ..proto::Team::default()
        }),
    );
    assert!(!seed.permits("carol", Section::Bucket, Action::Create, create()));
}

#[test]
fn removing_a_user_revokes_every_grant() {
    let seed = bucket_reader();
    seed.grant("g-global", "user", "u2", &system_permission_id(Category::Global), Category::System, None);
    seed.apply(
        Section::User,
        Action::Remove,
        Payload::User(proto::User {
            id: "u2".to_owned(),
            user_name: "bob".to_owned(),
            ..proto::User::default()
        }),
    );

    for scope in Scope::ALL {
        let left = seed
            .cache
            .read(|d| d.grants().store(scope).get_subject_grant_ids(soma_msg::SubjectKind::User, "u2"));
        assert!(left.is_empty(), "{scope} still holds grants");
    }
    assert!(!seed.permits("bob", Section::Bucket, Action::Show, objects(Some("r1"), Some("b1"), None)));
}

#[test]
fn destroying_a_repository_revokes_grants_on_it_and_its_buckets() {
    let seed = bucket_reader();
    seed.grant("g2", "user", "u2", "p-bucket-read", Category::Repository, Some("r1"));
    seed.apply(
        Section::Repository,
        Action::Destroy,
        Payload::Repository(proto::Repository {
            id: "r1".to_owned(),
            ..proto::Repository::default()
        }),
    );

    let remaining = seed.cache.read(|d| d.grants().store(Scope::Repository).len());
    assert_eq!(remaining, 0);
    assert!(!seed.permits("bob", Section::Bucket, Action::Show, objects(Some("r1"), Some("b1"), None)));
}

#[test]
fn revoke_restores_previous_state() {
    let seed = bucket_reader();
    seed.apply(
        Section::Right,
        Action::Revoke,
        Payload::Grant(proto::Grant {
            id: "g1".to_owned(),
            recipient_type: "user".to_owned(),
            recipient_id: "u2".to_owned(),
            permission_id: "p-bucket-read".to_owned(),
            category: Category::Repository,
            object_type: None,
            object_id: Some("b1".to_owned()),
        }),
    );
    assert!(!seed.permits("bob", Section::Bucket, Action::Show, objects(Some("r1"), Some("b1"), None)));
    // Revoking an unknown grant is a no-op.
    seed.apply(
        Section::Right,
        Action::Revoke,
        Payload::Grant(proto::Grant {
            id: "g-unknown".to_owned(),
            recipient_type: "user".to_owned(),
            recipient_id: "u2".to_owned(),
            permission_id: String::new(),
            category: Category::Repository,
            object_type: None,
            object_id: None,
        }),
    );
}

#[test]
fn unknown_subject_is_denied() {
    let seed = bucket_reader();
    let request = Request::detached(Section::Bucket, Action::Show, Payload::None).with_author("mallory");
    let decision = seed.cache.authorize(&request);
    assert!(!decision.is_permitted());
    assert_eq!(decision.audit.get(AUTHORIZE_KEY), Some("UnknownSubject"));
}

#[test]
#[traced_test]
fn missing_system_permission_denies_and_warns() {
    let seed = bucket_reader();
    seed.apply(
        Section::Permission,
        Action::Remove,
        Payload::Permission(proto::Permission {
            id: system_permission_id(Category::Repository),
            name: "repository".to_owned(),
            category: Category::System,
            mappings: vec![],
        }),
    );

    let request = Request::detached(Section::Bucket, Action::Show, Payload::None)
        .with_author("bob")
        .with_objects(objects(Some("r1"), Some("b1"), None));
    let decision = seed.cache.authorize(&request);
    assert!(!decision.is_permitted());
    assert_eq!(decision.audit.get(AUTHORIZE_KEY), Some("MissingSystemPermission"));
    assert!(logs_contain("system permission missing for category"));
}

#[test]
fn node_placement_needs_a_right_on_the_target_repository() {
    let seed = Seed::new();
    seed.team("t1")
        .login(Section::User, "u2", "bob", "t1")
        .repository("r1", "t1")
        .repository("r2", "t1")
        .bucket("b1", "r1")
        .bucket("b2", "r2")
        .apply(
            Section::Node,
            Action::Add,
            Payload::Node(proto::Node {
                id: "n1".to_owned(),
                name: "web01".to_owned(),
                team_id: "t1".to_owned(),
                bucket_id: None,
            }),
        )
        .apply(
            Section::NodeConfig,
            Action::Assign,
            Payload::NodeConfig(proto::NodeConfig {
                node_id: "n1".to_owned(),
                repository_id: "r1".to_owned(),
                bucket_id: "b1".to_owned(),
            }),
        )
        .permission(
            "p-place",
            "nodeconfig.assign",
            Category::Repository,
            vec![action_mapping(Section::NodeConfig, Action::Assign)],
        )
        .grant("g-place", "user", "u2", "p-place", Category::Repository, Some("r1"));

    let into = |repository: &str, bucket: &str| ObjectIds {
        node: Some("n1".to_owned()),
        team: Some("t1".to_owned()),
        repository: Some(repository.to_owned()),
        bucket: Some(bucket.to_owned()),
        ..ObjectIds::default()
    };
    assert!(seed.permits("bob", Section::NodeConfig, Action::Assign, into("r1", "b1")));
    assert!(!seed.permits("bob", Section::NodeConfig, Action::Assign, into("r2", "b2")));
    // The repository named by the caller does not override the bucket's parent.
    assert!(!seed.permits("bob", Section::NodeConfig, Action::Assign, into("r1", "b2")));
}

#[test]
fn audit_trail_records_store_assessments() {
    let seed = bucket_reader();
    let request = Request::detached(Section::Bucket, Action::Show, Payload::None)
        .with_author("bob")
        .with_objects(objects(Some("r1"), Some("b1"), None));
    let decision = seed.cache.authorize(&request);
    assert_eq!(
        decision.audit.get("permCache/grant/repository::assessment"),
        Some("SuccessFindingGrant")
    );
    assert_eq!(
        decision.audit.get("permCache/grant/global::assessment"),
        Some("SubjectHasNoGrants")
    );
    assert_eq!(decision.audit.get(AUTHORIZE_KEY), Some("SubjectGranted"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_and_writers_share_the_cache() {
    let seed = Arc::new(bucket_reader());
    let mut tasks = Vec::new();
    for i in 0..16 {
        let seed = seed.clone();
        tasks.push(tokio::spawn(async move {
            if i % 4 == 0 {
                seed.grant(
                    &format!("g-extra-{i}"),
                    "user",
                    "u2",
                    "p-bucket-read",
                    Category::Repository,
                    Some("b2"),
                );
            }
            seed.permits("bob", Section::Bucket, Action::Show, objects(Some("r1"), Some("b1"), None))
        }));
    }
    let results = futures::future::join_all(tasks).await;
    assert!(results.into_iter().all(|r| r.unwrap()));
    assert!(seed.permits("bob", Section::Bucket, Action::Show, objects(Some("r1"), Some("b2"), None)));
}
