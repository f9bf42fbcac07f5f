//! HTTP surface tests for the plan API
//!
//! Run with: cargo test --test http_plan_api

mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use common::{linked_plan_service, open_app, open_app_with_auth, plan, send, send_json};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use planstore::auth::{Claims, JwtVerifier};
use serde_json::json;

#[tokio::test]
async fn create_get_and_conditional_get() {
    let test = open_app().await;
    let router = &test.router;

    let created = send_json(router, Method::POST, "/v1/plan", &[], &plan("p1", 2)).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["objectId"], "p1");
    assert_eq!(created.body["message"], "Plan successfully created.");

    let fetched = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, plan("p1", 2));
    let etag = fetched.etag();
    assert_eq!(etag, created.etag());

    let again = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(again.etag(), etag);

    let cached = send(router, Method::GET, "/v1/plan/p1", &[("if-none-match", &etag)], None).await;
    assert_eq!(cached.status, StatusCode::NOT_MODIFIED);
    assert_eq!(cached.body, serde_json::Value::Null);

    let wildcard = send(router, Method::GET, "/v1/plan/p1", &[("if-none-match", "*")], None).await;
    assert_eq!(wildcard.status, StatusCode::NOT_MODIFIED);
    assert_eq!(wildcard.etag(), etag);

    let stale = send(router, Method::GET, "/v1/plan/p1", &[("if-none-match", "\"old\"")], None).await;
    assert_eq!(stale.status, StatusCode::OK);

    let missing = send(router, Method::GET, "/v1/plan/nope", &[], None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["code"], "not_found");
}

#[tokio::test]
async fn create_rejects_bad_input_and_duplicates() {
    let test = open_app().await;
    let router = &test.router;

    let malformed = send(router, Method::POST, "/v1/plan", &[], Some("{\"objectId\":".to_string())).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let empty = send(router, Method::POST, "/v1/plan", &[], Some(String::new())).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let mut extra = plan("p1", 1);
    extra["linkedPlanServices"][0]["linkedService"]["extra"] = json!(true);
    let invalid = send_json(router, Method::POST, "/v1/plan", &[], &extra).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body["code"], "schema_violation");

    let first = send_json(router, Method::POST, "/v1/plan", &[], &plan("p1", 1)).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let mut changed = plan("p1", 0);
    changed["planStatus"] = json!("outOfNetwork");
    let duplicate = send_json(router, Method::POST, "/v1/plan", &[], &changed).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let stored = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(stored.body, plan("p1", 1));
}

#[tokio::test]
async fn create_rejects_repeated_object_ids() {
    let test = open_app().await;
    let router = &test.router;

    let mut repeated = plan("p1", 1);
    repeated["linkedPlanServices"]
        .as_array_mut()
        .unwrap()
        .push(linked_plan_service("p1", 0));
    let rejected = send_json(router, Method::POST, "/v1/plan", &[], &repeated).await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.body["code"], "schema_violation");

    let missing = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let empty = send_json(router, Method::POST, "/v1/plan", &[], &json!({})).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_patch_is_a_no_op_with_same_etag() {
    let test = open_app().await;
    let router = &test.router;
    send_json(router, Method::POST, "/v1/plan", &[], &plan("p1", 1)).await;
    let etag = send(router, Method::GET, "/v1/plan/p1", &[], None).await.etag();

    let unchanged = send_json(router, Method::PATCH, "/v1/plan/p1", &[("if-match", &etag)], &json!({})).await;
    assert_eq!(unchanged.status, StatusCode::OK);
    assert_eq!(unchanged.etag(), etag);
    assert_eq!(unchanged.body, plan("p1", 1));

    let null = send(router, Method::PATCH, "/v1/plan/p1", &[("if-match", &etag)], Some("null".to_string())).await;
    assert_eq!(null.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_requires_current_etag() {
    let test = open_app().await;
    let router = &test.router;
    send_json(router, Method::POST, "/v1/plan", &[], &plan("p1", 1)).await;
    let etag = send(router, Method::GET, "/v1/plan/p1", &[], None).await.etag();

    let patch = json!({"planStatus": "outOfNetwork"});
    let missing = send_json(router, Method::PATCH, "/v1/plan/p1", &[], &patch).await;
    assert_eq!(missing.status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(missing.body["error"], "Precondition failed: If-Match header is required");

    let stale = send_json(router, Method::PATCH, "/v1/plan/p1", &[("if-match", "\"stale\"")], &patch).await;
    assert_eq!(stale.status, StatusCode::PRECONDITION_FAILED);

    let unchanged = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(unchanged.body, plan("p1", 1));
    assert_eq!(unchanged.etag(), etag);

    let updated = send_json(router, Method::PATCH, "/v1/plan/p1", &[("if-match", &etag)], &patch).await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["planStatus"], "outOfNetwork");
    assert_ne!(updated.etag(), etag);

    let replay = send_json(router, Method::PATCH, "/v1/plan/p1", &[("if-match", &etag)], &patch).await;
    assert_eq!(replay.status, StatusCode::PRECONDITION_FAILED);

    let current = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(current.etag(), updated.etag());

    let absent = send_json(router, Method::PATCH, "/v1/plan/nope", &[("if-match", &etag)], &patch).await;
    assert_eq!(absent.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_merges_linked_plan_services_by_id() {
    let test = open_app().await;
    let router = &test.router;
    send_json(router, Method::POST, "/v1/plan", &[], &plan("p1", 2)).await;
    let etag = send(router, Method::GET, "/v1/plan/p1", &[], None).await.etag();

    let mut existing = linked_plan_service("p1", 0);
    existing["linkedService"]["name"] = json!("ignored");
    let patch = json!({"linkedPlanServices": [existing, linked_plan_service("p1", 5)]});

    let updated = send_json(router, Method::PATCH, "/v1/plan/p1", &[("if-match", &etag)], &patch).await;
    assert_eq!(updated.status, StatusCode::OK);
    let services = updated.body["linkedPlanServices"].as_array().unwrap();
    let ids: Vec<&str> = services.iter().map(|s| s["objectId"].as_str().unwrap()).collect();
    assert_eq!(ids, ["p1-lps-0", "p1-lps-1", "p1-lps-5"]);
    assert_eq!(services[0]["linkedService"]["name"], "service 0");

    let mut colliding = linked_plan_service("p1", 6);
    colliding["planserviceCostShares"]["objectId"] = json!("p1-pcs");
    let rejected = send_json(
        router,
        Method::PATCH,
        "/v1/plan/p1",
        &[("if-match", &updated.etag())],
        &json!({"linkedPlanServices": [colliding]}),
    )
    .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_rejects_invalid_merge_and_object_id_change() {
    let test = open_app().await;
    let router = &test.router;
    send_json(router, Method::POST, "/v1/plan", &[], &plan("p1", 1)).await;
    let etag = send(router, Method::GET, "/v1/plan/p1", &[], None).await.etag();

    let renamed = send_json(router, Method::PATCH, "/v1/plan/p1", &[("if-match", &etag)], &json!({"objectId": "p2"})).await;
    assert_eq!(renamed.status, StatusCode::BAD_REQUEST);
    assert_eq!(renamed.body["code"], "immutable_field");

    let invalid = send_json(
        router,
        Method::PATCH,
        "/v1/plan/p1",
        &[("if-match", &etag)],
        &json!({"planCostShares": {"copay": "free"}}),
    )
    .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let current = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(current.body, plan("p1", 1));
    assert_eq!(current.etag(), etag);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let test = open_app().await;
    let router = &test.router;
    send_json(router, Method::POST, "/v1/plan", &[], &plan("p1", 1)).await;

    let deleted = send(router, Method::DELETE, "/v1/plan/p1", &[], None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let again = send(router, Method::DELETE, "/v1/plan/p1", &[], None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bearer_token_is_required_when_jwt_is_enabled() {
    let verifier = Arc::new(JwtVerifier::hs256(b"test-secret", None, None));
    let test = open_app_with_auth(verifier).await;
    let router = &test.router;

    let health = send(router, Method::GET, "/health", &[], None).await;
    assert_eq!(health.status, StatusCode::OK);

    let anonymous = send(router, Method::GET, "/v1/plan/p1", &[], None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let garbage = send(router, Method::GET, "/v1/plan/p1", &[("authorization", "Bearer nope")], None).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);

    let claims = Claims {
        sub: "tester".to_string(),
        exp: (chrono::Utc::now().timestamp() + 600) as u64,
        iss: None,
        aud: None,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap();
    let bearer = format!("Bearer {token}");

    let created = send_json(router, Method::POST, "/v1/plan", &[("authorization", &bearer)], &plan("p1", 0)).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let fetched = send(router, Method::GET, "/v1/plan/p1", &[("authorization", &bearer)], None).await;
    assert_eq!(fetched.status, StatusCode::OK);
}
