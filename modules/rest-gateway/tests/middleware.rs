#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Request-wrapping middleware: shutdown, request ids, modes, basic
//! authentication and the ping.

mod common;

use axum::http::{Method, StatusCode, header};
use common::{Fabric, ROOT};
use rest_gateway::RestConfig;
use serde_json::json;
use tracing_test::traced_test;
use uuid::Uuid;

#[tokio::test]
async fn ping_reports_version_and_mode() {
    let fabric = Fabric::new();
    let reply = fabric.call(Method::HEAD, "/", None, None).await;

    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(reply.headers["x-powered-by"], "SOMA Configuration System");
    assert_eq!(reply.headers["x-version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(reply.headers["x-soma-mode"], "normal");
}

#[tokio::test]
async fn every_response_carries_a_fresh_request_id() {
    let fabric = Fabric::new();
    let first = fabric.call(Method::HEAD, "/", None, None).await;
    let second = fabric.get("/team/", ROOT).await;

    let a = Uuid::parse_str(first.headers["x-request-id"].to_str().unwrap()).unwrap();
    let b = Uuid::parse_str(second.headers["x-request-id"].to_str().unwrap()).unwrap();
    assert_ne!(a, b);
    assert_eq!(second.json()["requestId"], b.to_string());
}

#[tokio::test]
async fn shutdown_refuses_with_bare_503() {
    let fabric = Fabric::new();
    fabric.state.begin_shutdown();

    let reply = fabric.get("/team/", ROOT).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(reply.bytes.is_empty());
    assert_eq!(fabric.state.metrics.refused(), 1);
    assert_eq!(fabric.state.metrics.requests(), 0);
}

#[tokio::test]
async fn requests_and_routes_are_counted() {
    let fabric = Fabric::new();
    fabric.get("/team/", ROOT).await;
    fabric.get("/team/", ROOT).await;
    fabric.call(Method::HEAD, "/", None, None).await;

    assert_eq!(fabric.state.metrics.requests(), 3);
    assert_eq!(fabric.state.metrics.route_count("GET /team/"), 2);
    assert_eq!(fabric.state.metrics.route_count("HEAD /"), 1);
}

#[tokio::test]
async fn missing_credentials_ask_for_basic_auth() {
    let fabric = Fabric::new();
    let reply = fabric.call(Method::GET, "/team/", None, None).await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.headers[header::WWW_AUTHENTICATE], "Basic realm=Restricted");
}

#[tokio::test]
#[traced_test]
async fn wrong_token_is_401_and_logged() {
    let fabric = Fabric::new();
    let reply = fabric.get("/team/", ("root", "guess")).await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(logs_contain("basic authentication rejected"));
}

#[tokio::test]
async fn validate_answers_204_for_known_tokens() {
    let fabric = Fabric::new();
    let reply = fabric
        .call(Method::HEAD, "/authenticate/validate", Some(ROOT), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn missing_authentication_handler_is_503() {
    let fabric = Fabric::with_config(RestConfig::default(), false);
    let reply = fabric.get("/team/", ROOT).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn open_instance_skips_authentication_and_authorization() {
    let config = RestConfig {
        open_instance: true,
        ..RestConfig::default()
    };
    let fabric = Fabric::with_config(config, true);

    let reply = fabric.call(Method::GET, "/team/", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["teams"][0]["name"], "wheel");
}

#[tokio::test]
async fn read_only_refuses_writes_but_serves_reads() {
    let config = RestConfig {
        read_only: true,
        ..RestConfig::default()
    };
    let fabric = Fabric::with_config(config, true);

    let write = fabric.post("/team/", ROOT, json!({ "team": { "name": "beta" } })).await;
    assert_eq!(write.status, StatusCode::SERVICE_UNAVAILABLE);

    let read = fabric.get("/team/", ROOT).await;
    assert_eq!(read.status, StatusCode::OK);

    let search = fabric
        .post("/search/team/", ROOT, json!({ "filter": { "name": "wheel" } }))
        .await;
    assert_eq!(search.status, StatusCode::OK);
    assert_eq!(search.json()["teams"].as_array().unwrap().len(), 1);

    let ping = fabric.call(Method::HEAD, "/", None, None).await;
    assert_eq!(ping.headers["x-soma-mode"], "read-only");
}

#[tokio::test]
async fn observer_keeps_key_exchange_open() {
    let config = RestConfig {
        observer: true,
        ..RestConfig::default()
    };
    let fabric = Fabric::with_config(config, true);

    let kex = fabric
        .call(
            Method::POST,
            "/kex/",
            None,
            Some(json!({ "publicKey": "aa", "initializationVector": "bb" })),
        )
        .await;
    assert_eq!(kex.status, StatusCode::OK);

    let token = fabric
        .call(Method::PUT, "/tokens/request/whatever", None, Some(json!({})))
        .await;
    assert_eq!(token.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_route_is_404_envelope() {
    let fabric = Fabric::new();
    let reply = fabric.get("/widget/", ROOT).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let body = reply.json();
    assert_eq!(body["statusCode"], 404);
    assert_eq!(body["statusText"], "NotFound");
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let config = RestConfig {
        body_limit_bytes: 64,
        ..RestConfig::default()
    };
    let fabric = Fabric::with_config(config, true);
    let name = "x".repeat(200);
    let reply = fabric.post("/team/", ROOT, json!({ "team": { "name": name } })).await;

    assert!(reply.status == StatusCode::PAYLOAD_TOO_LARGE || reply.status == StatusCode::BAD_REQUEST);
}
