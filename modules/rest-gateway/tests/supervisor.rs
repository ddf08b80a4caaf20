#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Key exchange, token and account endpoints, and the masking of
//! supervisor replies.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use common::{Fabric, ROOT};
use serde_json::{Value, json};

async fn open_kex(fabric: &Fabric) -> String {
    let reply = fabric
        .call(
            Method::POST,
            "/kex/",
            None,
            Some(json!({ "publicKey": "c0ffee", "initializationVector": "0011" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let kex = reply.json();
    assert!(kex["validUntil"].is_string());
    assert!(kex.get("statusCode").is_none(), "kex is answered raw");
    kex["id"].as_str().unwrap().to_owned()
}

async fn encrypted(fabric: &Fabric, method: Method, uri: &str, payload: &Value) -> common::Reply {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(payload.to_string()))
        .unwrap();
    fabric.send(req).await
}

#[tokio::test]
async fn token_request_returns_octet_stream_usable_for_basic_auth() {
    let fabric = Fabric::new();
    let kex_id = open_kex(&fabric).await;

    let reply = encrypted(
        &fabric,
        Method::PUT,
        &format!("/tokens/request/{kex_id}"),
        &json!({ "user": "root", "password": "root-token" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/octet-stream");

    let issued: Value = reply.json();
    assert_eq!(issued["user"], "root");
    let token = issued["token"].as_str().unwrap();

    let check = fabric
        .call(Method::HEAD, "/authenticate/validate", Some(("root", token)), None)
        .await;
    assert_eq!(check.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn kex_is_single_use_and_failures_are_masked() {
    let fabric = Fabric::new();
    let kex_id = open_kex(&fabric).await;
    let uri = format!("/tokens/request/{kex_id}");
    let payload = json!({ "user": "root", "password": "root-token" });

    assert_eq!(encrypted(&fabric, Method::PUT, &uri, &payload).await.status, StatusCode::OK);

    let reused = encrypted(&fabric, Method::PUT, &uri, &payload).await;
    assert_eq!(reused.status, StatusCode::FORBIDDEN);
    assert!(reused.bytes.is_empty(), "refused exchange leaked a body");
}

#[tokio::test]
async fn unreadable_kex_is_forbidden() {
    let fabric = Fabric::new();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/kex/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let reply = fabric.send(req).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(reply.bytes.is_empty());
}

#[tokio::test]
async fn activation_policy_violation_is_409_with_reason() {
    let fabric = Fabric::new();
    let kex_id = open_kex(&fabric).await;

    let reply = encrypted(
        &fabric,
        Method::PUT,
        &format!("/accounts/activate/user/{kex_id}"),
        &json!({ "user": "carol", "password": "short" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    let body = reply.json();
    assert_eq!(body["statusText"], "Conflict");
    assert!(
        body["errors"][0]
            .as_str()
            .unwrap()
            .contains("at least 12 characters")
    );
}

#[tokio::test]
async fn activated_account_can_change_its_password() {
    let fabric = Fabric::new();
    let kex_id = open_kex(&fabric).await;
    let reply = encrypted(
        &fabric,
        Method::PUT,
        &format!("/accounts/activate/user/{kex_id}"),
        &json!({ "user": "carol", "password": "a-long-passphrase" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let kex_id = open_kex(&fabric).await;
    let reply = encrypted(
        &fabric,
        Method::PATCH,
        &format!("/accounts/password/{kex_id}"),
        &json!({
            "user": "carol",
            "password": "a-long-passphrase",
            "newPassword": "another-long-passphrase"
        }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["changed"], true);
}

#[tokio::test]
async fn invalidated_token_no_longer_authenticates() {
    let fabric = Fabric::new();

    let reply = fabric.delete("/tokens/self/active", ROOT).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["statusText"], "OK");

    let check = fabric
        .call(Method::HEAD, "/authenticate/validate", Some(ROOT), None)
        .await;
    assert_eq!(check.status, StatusCode::UNAUTHORIZED);
}
