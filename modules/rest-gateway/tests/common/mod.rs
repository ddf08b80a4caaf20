#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! In-process fabric for router tests: real supervisor, iam and inventory
//! workers behind the full middleware stack.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use iam::{IamService, IamWorker};
use inventory::{InventoryService, InventoryWorker};
use perm_cache::PermCache;
use perm_cache::catalog::{self, RootAccount};
use rest_gateway::{AppState, RestConfig};
use secrecy::SecretString;
use serde_json::Value;
use soma_msg::{HandlerMap, Worker, handler_names};
use supervisor::config::ActivationConfig;
use supervisor::{Service, SupervisorConfig, SupervisorWorker};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const ROOT: (&str, &str) = ("root", "root-token");

/// Accounts the supervisor knows, as (login, token).
pub const ACCOUNTS: &[(&str, &str)] = &[
    ROOT,
    ("admin_ops", "ops-token"),
    ("admin_x", "x-token"),
    ("bob", "bob-token"),
    ("carl", "carl-token"),
];

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap()
    }
}

pub struct Fabric {
    pub state: AppState,
    pub app: Router,
    cancel: CancellationToken,
}

impl Fabric {
    pub fn new() -> Self {
        Self::with_config(RestConfig::default(), true)
    }

    /// Builds the fabric; `with_supervisor = false` leaves the
    /// authentication handler out of the registry.
    pub fn with_config(config: RestConfig, with_supervisor: bool) -> Self {
        let cache = Arc::new(PermCache::new());
        let root = RootAccount {
            user_id: "u-root".to_owned(),
            user_name: ROOT.0.to_owned(),
            team_id: "t-root".to_owned(),
            team_name: "wheel".to_owned(),
        };
        for event in catalog::bootstrap(&root) {
            cache.perform(&event).unwrap();
        }

        let cancel = CancellationToken::new();
        let mut handlers = HandlerMap::new();
        if with_supervisor {
            let tokens: BTreeMap<String, SecretString> = ACCOUNTS
                .iter()
                .map(|(user, token)| ((*user).to_owned(), SecretString::from(*token)))
                .collect();
            let cfg = SupervisorConfig {
                tokens,
                activation: ActivationConfig {
                    pending: vec!["carol".to_owned()],
                    min_password_length: 12,
                },
                ..SupervisorConfig::default()
            };
            handlers.add(Arc::new(Worker::spawn(
                handler_names::SUPERVISOR,
                16,
                SupervisorWorker::new(Arc::new(Service::from_config(&cfg))),
                cancel.clone(),
            )));
        }
        handlers.add(Arc::new(Worker::spawn(
            handler_names::IAM,
            16,
            IamWorker::new(IamService::new(cache.clone())),
            cancel.clone(),
        )));
        handlers.add(Arc::new(Worker::spawn(
            handler_names::INVENTORY,
            16,
            InventoryWorker::new(InventoryService::new(cache.clone())),
            cancel.clone(),
        )));

        let state = AppState::new(config, handlers, cache);
        let app = rest_gateway::router(state.clone());
        Self { state, app, cancel }
    }

    pub async fn send(&self, req: Request<Body>) -> Reply {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec();
        Reply {
            status,
            headers,
            bytes,
        }
    }

    /// JSON request with optional basic credentials.
    pub async fn call(&self, method: Method, uri: &str, auth: Option<(&str, &str)>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user, token)) = auth {
            builder = builder.header(header::AUTHORIZATION, basic(user, token));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, auth: (&str, &str)) -> Reply {
        self.call(Method::GET, uri, Some(auth), None).await
    }

    pub async fn post(&self, uri: &str, auth: (&str, &str), body: Value) -> Reply {
        self.call(Method::POST, uri, Some(auth), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, auth: (&str, &str)) -> Reply {
        self.call(Method::DELETE, uri, Some(auth), None).await
    }

    /// POSTs as root and returns the id of the first entity in `field`.
    pub async fn create(&self, uri: &str, field: &str, body: Value) -> String {
        let reply = self.post(uri, ROOT, body).await;
        assert!(
            reply.status == StatusCode::OK || reply.status == StatusCode::ACCEPTED,
            "POST {uri} answered {}: {}",
            reply.status,
            String::from_utf8_lossy(&reply.bytes)
        );
        reply.json()[field][0]["id"].as_str().unwrap().to_owned()
    }
}

impl Drop for Fabric {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn basic(user: &str, token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{token}")))
}
