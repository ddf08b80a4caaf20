//! Inventory routes: repositories and everything below them, nodes and
//! monitoring systems.
//!
//! Each route fills the object ids it knows from the URL; the evaluator
//! replaces them with the ids recorded in the cache wherever it has them.

use axum::Router;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use soma_msg::{Action, ObjectIds, Payload, Section, proto};

use crate::adapter::{self, Call, dispatch, respond, submit};
use crate::context::{Caller, RequestMeta};
use crate::dto::{JsonBody, require};
use crate::error::RestError;
use crate::state::AppState;
use crate::validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/repository/", get(list_repositories).post(create_repository))
        .route("/search/repository/", post(search_repositories))
        .route(
            "/repository/{repository}",
            get(show_repository).delete(destroy_repository),
        )
        .route("/repository/{repository}/tree", get(repository_tree))
        .route(
            "/repository/{repository}/bucket/",
            get(list_buckets).post(create_bucket),
        )
        .route(
            "/repository/{repository}/bucket/{bucket}",
            get(show_bucket).delete(destroy_bucket),
        )
        .route(
            "/repository/{repository}/bucket/{bucket}/cluster/",
            get(list_clusters).post(create_cluster),
        )
        .route(
            "/repository/{repository}/bucket/{bucket}/cluster/{cluster}",
            get(show_cluster).delete(destroy_cluster),
        )
        .route(
            "/repository/{repository}/bucket/{bucket}/group/",
            get(list_groups).post(create_group),
        )
        .route(
            "/repository/{repository}/bucket/{bucket}/group/{group}",
            get(show_group).delete(destroy_group),
        )
        .route("/node/", get(list_nodes).post(add_node))
        .route("/search/node/", post(search_nodes))
        .route("/node/{node}", get(show_node).delete(remove_node))
        .route("/node/{node}/config", put(assign_node).delete(unassign_node))
        .route("/monitoring/", get(list_monitorings).post(add_monitoring))
        .route(
            "/monitoring/{monitoring}",
            get(show_monitoring).delete(remove_monitoring),
        )
}

async fn run(state: &AppState, meta: &RequestMeta, caller: &Caller, call: Result<Call, RestError>) -> Response {
    match call {
        Ok(call) => dispatch(state, meta, caller, call).await,
        Err(err) => err.into_response(),
    }
}

fn in_repository(repository: &str) -> ObjectIds {
    ObjectIds {
        repository: Some(repository.to_owned()),
        ..ObjectIds::default()
    }
}

fn in_bucket(repository: &str, bucket: &str) -> ObjectIds {
    ObjectIds {
        bucket: Some(bucket.to_owned()),
        ..in_repository(repository)
    }
}

/// A bucket addressed below a repository it is not part of does not exist.
fn check_parent(state: &AppState, repository: &str, bucket: &str) -> Result<(), RestError> {
    match state.cache.bucket_repository(bucket) {
        Some(parent) if parent != repository => Err(RestError::not_found("bucket", bucket)),
        _ => Ok(()),
    }
}

/// Like [`run`] for calls addressed below a bucket. The parent check runs
/// after authorization so a refused caller learns nothing about placement.
async fn run_in_bucket(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    call: Result<Call, RestError>,
    (repository, bucket): (&str, &str),
) -> Response {
    let call = match call {
        Ok(call) => call,
        Err(err) => return err.into_response(),
    };
    let (mut request, pending) = adapter::envelope(meta, caller, call);
    if let Err(err) = adapter::authorize(state, &mut request)
        .and_then(|()| check_parent(state, repository, bucket))
    {
        return err.into_response();
    }
    respond(submit(state, request, pending).await)
}

// repository

fn repository(id: String) -> proto::Repository {
    proto::Repository {
        id,
        ..proto::Repository::default()
    }
}

async fn list_repositories(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    dispatch(&state, &meta, &caller, Call::new(Section::Repository, Action::List)).await
}

async fn search_repositories(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.filter, "filter")
        .map(|f| Call::new(Section::Repository, Action::Search).payload(Payload::Filter(f)));
    run(&state, &meta, &caller, call).await
}

async fn create_repository(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.repository, "repository").and_then(|r| {
        validate::name("repository", &r.name, validate::MAX_NAME_LEN)?;
        let objects = ObjectIds {
            team: Some(r.team_id.clone()),
            ..ObjectIds::default()
        };
        Ok(Call::new(Section::Repository, Action::Create)
            .objects(objects)
            .payload(Payload::Repository(r)))
    });
    run(&state, &meta, &caller, call).await
}

async fn by_repository(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    action: Action,
    id: String,
) -> Response {
    let call = Call::new(Section::Repository, action)
        .objects(in_repository(&id))
        .payload(Payload::Repository(repository(id)));
    dispatch(state, meta, caller, call).await
}

async fn show_repository(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    by_repository(&state, &meta, &caller, Action::Show, id).await
}

async fn destroy_repository(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    by_repository(&state, &meta, &caller, Action::Destroy, id).await
}

async fn repository_tree(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    by_repository(&state, &meta, &caller, Action::Tree, id).await
}

// bucket

fn bucket_call(action: Action, repository: String, bucket: proto::Bucket) -> Call {
    // A bucket that is being created is authorized against its repository.
    let objects = if bucket.id.is_empty() || action == Action::Create {
        in_repository(&repository)
    } else {
        in_bucket(&repository, &bucket.id)
    };
    Call::new(Section::Bucket, action)
        .objects(objects)
        .payload(Payload::Bucket(proto::Bucket {
            repository_id: repository,
            ..bucket
        }))
}

async fn list_buckets(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(repository): Path<String>,
) -> Response {
    let call = bucket_call(Action::List, repository, proto::Bucket::default());
    dispatch(&state, &meta, &caller, call).await
}

async fn create_bucket(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(repository): Path<String>,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.bucket, "bucket").and_then(|b| {
        validate::name("bucket", &b.name, validate::MAX_NAME_LEN)?;
        if !b.repository_id.is_empty() && b.repository_id != repository {
            return Err(RestError::Invalid(format!(
                "bucket names repository {}, the URL names {repository}",
                b.repository_id
            )));
        }
        Ok(bucket_call(Action::Create, repository, b))
    });
    run(&state, &meta, &caller, call).await
}

async fn by_bucket(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    action: Action,
    (repository, bucket): (String, String),
) -> Response {
    let b = proto::Bucket {
        id: bucket.clone(),
        ..proto::Bucket::default()
    };
    let call = bucket_call(action, repository.clone(), b);
    run_in_bucket(state, meta, caller, Ok(call), (&repository, &bucket)).await
}

async fn show_bucket(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String)>,
) -> Response {
    by_bucket(&state, &meta, &caller, Action::Show, ids).await
}

async fn destroy_bucket(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String)>,
) -> Response {
    by_bucket(&state, &meta, &caller, Action::Destroy, ids).await
}

// cluster and group

/// Cluster or group: a named member of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Member {
    Cluster,
    Group,
}

impl Member {
    const fn section(self) -> Section {
        match self {
            Self::Cluster => Section::Cluster,
            Self::Group => Section::Group,
        }
    }

    fn payload(self, id: String, name: String, bucket_id: String) -> Payload {
        match self {
            Self::Cluster => Payload::Cluster(proto::Cluster { id, name, bucket_id }),
            Self::Group => Payload::Group(proto::Group { id, name, bucket_id }),
        }
    }

    fn call(self, action: Action, (repository, bucket): (&str, &str), (id, name): (String, String)) -> Call {
        let mut objects = in_bucket(repository, bucket);
        if !id.is_empty() {
            match self {
                Self::Cluster => objects.cluster = Some(id.clone()),
                Self::Group => objects.group = Some(id.clone()),
            }
        }
        Call::new(self.section(), action)
            .objects(objects)
            .payload(self.payload(id, name, bucket.to_owned()))
    }
}

async fn list_members(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    member: Member,
    (repository, bucket): (String, String),
) -> Response {
    let call = member.call(Action::List, (&repository, &bucket), (String::new(), String::new()));
    run_in_bucket(state, meta, caller, Ok(call), (&repository, &bucket)).await
}

async fn create_member(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    member: Member,
    (repository, bucket): (String, String),
    name: Result<String, RestError>,
) -> Response {
    let kind = member.section().as_str();
    let call = name.and_then(|name| {
        validate::name(kind, &name, validate::MAX_NAME_LEN)?;
        Ok(member.call(Action::Create, (&repository, &bucket), (String::new(), name)))
    });
    run_in_bucket(state, meta, caller, call, (&repository, &bucket)).await
}

async fn by_member(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    member: Member,
    action: Action,
    (repository, bucket, id): (String, String, String),
) -> Response {
    let call = member.call(action, (&repository, &bucket), (id, String::new()));
    run_in_bucket(state, meta, caller, Ok(call), (&repository, &bucket)).await
}

async fn list_clusters(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String)>,
) -> Response {
    list_members(&state, &meta, &caller, Member::Cluster, ids).await
}

async fn create_cluster(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Response {
    let name = require(body.cluster, "cluster").map(|c| c.name);
    create_member(&state, &meta, &caller, Member::Cluster, ids, name).await
}

async fn show_cluster(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String, String)>,
) -> Response {
    by_member(&state, &meta, &caller, Member::Cluster, Action::Show, ids).await
}

async fn destroy_cluster(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String, String)>,
) -> Response {
    by_member(&state, &meta, &caller, Member::Cluster, Action::Destroy, ids).await
}

async fn list_groups(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String)>,
) -> Response {
    list_members(&state, &meta, &caller, Member::Group, ids).await
}

async fn create_group(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Response {
    let name = require(body.group, "group").map(|g| g.name);
    create_member(&state, &meta, &caller, Member::Group, ids, name).await
}

async fn show_group(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String, String)>,
) -> Response {
    by_member(&state, &meta, &caller, Member::Group, Action::Show, ids).await
}

async fn destroy_group(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(ids): Path<(String, String, String)>,
) -> Response {
    by_member(&state, &meta, &caller, Member::Group, Action::Destroy, ids).await
}

// node

fn node_objects(id: &str) -> ObjectIds {
    ObjectIds {
        node: Some(id.to_owned()),
        ..ObjectIds::default()
    }
}

async fn list_nodes(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    dispatch(&state, &meta, &caller, Call::new(Section::Node, Action::List)).await
}

async fn search_nodes(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.filter, "filter")
        .map(|f| Call::new(Section::Node, Action::Search).payload(Payload::Filter(f)));
    run(&state, &meta, &caller, call).await
}

async fn add_node(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.node, "node").and_then(|n| {
        validate::name("node", &n.name, validate::MAX_NAME_LEN)?;
        let objects = ObjectIds {
            team: Some(n.team_id.clone()),
            ..ObjectIds::default()
        };
        Ok(Call::new(Section::Node, Action::Add)
            .objects(objects)
            .payload(Payload::Node(n)))
    });
    run(&state, &meta, &caller, call).await
}

async fn by_node(state: &AppState, meta: &RequestMeta, caller: &Caller, action: Action, id: String) -> Response {
    let call = Call::new(Section::Node, action)
        .objects(node_objects(&id))
        .payload(Payload::Node(proto::Node {
            id,
            ..proto::Node::default()
        }));
    dispatch(state, meta, caller, call).await
}

async fn show_node(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    by_node(&state, &meta, &caller, Action::Show, id).await
}

async fn remove_node(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    by_node(&state, &meta, &caller, Action::Remove, id).await
}

// node-config

/// Where a node is, or is about to be, placed. Every id comes from the
/// cache; the body only names the bucket of a new assignment.
fn placement(
    state: &AppState,
    node: &str,
    action: Action,
    requested: Option<proto::NodeConfig>,
) -> Result<proto::NodeConfig, RestError> {
    let bucket = if action == Action::Assign {
        let requested = require(requested, "nodeConfig")?;
        if requested.bucket_id.is_empty() {
            return Err(RestError::Invalid("node configuration names no bucket".to_owned()));
        }
        let parent = state
            .cache
            .bucket_repository(&requested.bucket_id)
            .ok_or_else(|| RestError::not_found("bucket", requested.bucket_id.as_str()))?;
        if !requested.repository_id.is_empty() && requested.repository_id != parent {
            return Err(RestError::Invalid(format!(
                "bucket {} is not part of repository {}",
                requested.bucket_id, requested.repository_id
            )));
        }
        requested.bucket_id
    } else {
        state
            .cache
            .member_bucket(node)
            .ok_or_else(|| RestError::not_found("node-config", node))?
    };
    let repository_id = state
        .cache
        .bucket_repository(&bucket)
        .ok_or_else(|| RestError::not_found("bucket", bucket.as_str()))?;
    Ok(proto::NodeConfig {
        node_id: node.to_owned(),
        repository_id,
        bucket_id: bucket,
    })
}

/// Node configuration changes need two rights: the node's team must allow
/// moving the node, and the target repository must allow the placement.
/// Unknown nodes and buckets are only reported to callers holding the first.
async fn configure(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    node: String,
    action: Action,
    requested: Option<proto::NodeConfig>,
) -> Result<Response, RestError> {
    let call = Call::new(Section::NodeConfig, action).objects(node_objects(&node));
    let (mut request, pending) = adapter::envelope(meta, caller, call);

    request.auth.section = Section::Node;
    adapter::authorize(state, &mut request)?;

    let team = state
        .cache
        .object_team(&node)
        .ok_or_else(|| RestError::not_found("node", node.as_str()))?;
    let config = placement(state, &node, action, requested)?;

    request.auth.section = Section::NodeConfig;
    request.auth.objects = ObjectIds {
        team: Some(team),
        repository: Some(config.repository_id.clone()),
        bucket: Some(config.bucket_id.clone()),
        ..node_objects(&node)
    };
    adapter::authorize(state, &mut request)?;

    request.payload = Payload::NodeConfig(config);
    Ok(respond(submit(state, request, pending).await))
}

async fn assign_node(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(node): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Response, RestError> {
    configure(&state, &meta, &caller, node, Action::Assign, body.node_config).await
}

async fn unassign_node(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(node): Path<String>,
) -> Result<Response, RestError> {
    configure(&state, &meta, &caller, node, Action::Unassign, None).await
}

// monitoring

fn monitoring_objects(id: &str) -> ObjectIds {
    ObjectIds {
        monitoring: Some(id.to_owned()),
        ..ObjectIds::default()
    }
}

async fn list_monitorings(State(state): State<AppState>, meta: RequestMeta, caller: Caller) -> Response {
    dispatch(&state, &meta, &caller, Call::new(Section::Monitoring, Action::List)).await
}

async fn add_monitoring(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    JsonBody(body): JsonBody,
) -> Response {
    let call = require(body.monitoring, "monitoring").and_then(|m| {
        validate::monitoring_name(&m.name)?;
        let objects = ObjectIds {
            team: Some(m.team_id.clone()),
            ..ObjectIds::default()
        };
        Ok(Call::new(Section::Monitoring, Action::Add)
            .objects(objects)
            .payload(Payload::Monitoring(m)))
    });
    run(&state, &meta, &caller, call).await
}

async fn by_monitoring(
    state: &AppState,
    meta: &RequestMeta,
    caller: &Caller,
    action: Action,
    id: String,
) -> Response {
    let call = Call::new(Section::Monitoring, action)
        .objects(monitoring_objects(&id))
        .payload(Payload::Monitoring(proto::Monitoring {
            id,
            ..proto::Monitoring::default()
        }));
    dispatch(state, meta, caller, call).await
}

async fn show_monitoring(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    by_monitoring(&state, &meta, &caller, Action::Show, id).await
}

async fn remove_monitoring(
    State(state): State<AppState>,
    meta: RequestMeta,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    by_monitoring(&state, &meta, &caller, Action::Remove, id).await
}
