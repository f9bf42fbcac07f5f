#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode},
};
use planstore::{
    AppConfig, Collaborators, PlanApp,
    auth::AllowAllVerifier,
    core::RetryPolicy,
    events::InMemoryBroker,
    index::{InMemorySearchIndex, SearchIndex},
    store::InMemoryKvStore,
};
use serde_json::{Value, json};
use tower::ServiceExt;

pub fn linked_plan_service(plan_id: &str, idx: usize) -> Value {
    json!({
        "linkedService": {
            "_org": "example.com",
            "objectId": format!("{plan_id}-ls-{idx}"),
            "objectType": "service",
            "name": format!("service {idx}")
        },
        "planserviceCostShares": {
            "deductible": 10,
            "_org": "example.com",
            "copay": 0,
            "objectId": format!("{plan_id}-scs-{idx}"),
            "objectType": "membercostshare"
        },
        "_org": "example.com",
        "objectId": format!("{plan_id}-lps-{idx}"),
        "objectType": "planservice"
    })
}

pub fn plan(plan_id: &str, services: usize) -> Value {
    let linked: Vec<Value> = (0..services).map(|idx| linked_plan_service(plan_id, idx)).collect();
    json!({
        "planCostShares": {
            "deductible": 2000,
            "_org": "example.com",
            "copay": 23,
            "objectId": format!("{plan_id}-pcs"),
            "objectType": "membercostshare"
        },
        "linkedPlanServices": linked,
        "_org": "example.com",
        "objectId": plan_id,
        "objectType": "plan",
        "planStatus": "inNetwork",
        "creationDate": "12-12-2017"
    })
}

pub fn test_config() -> AppConfig {
    AppConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        },
        outbox_relay_interval_ms: 10,
        index_replay_interval_ms: 10,
        index_shards: 3,
        ..AppConfig::default()
    }
}

pub struct TestApp {
    pub app: PlanApp,
    pub router: Router,
    pub index: Arc<InMemorySearchIndex>,
    pub broker: Arc<InMemoryBroker>,
}

pub async fn open_app() -> TestApp {
    open_app_with_auth(Arc::new(AllowAllVerifier)).await
}

pub async fn open_app_with_auth(auth: Arc<dyn planstore::auth::AuthVerifier>) -> TestApp {
    let config = test_config();
    let index = Arc::new(InMemorySearchIndex::new(config.index_shards));
    let broker = Arc::new(InMemoryBroker::new());
    let collaborators = Collaborators {
        kv: Arc::new(InMemoryKvStore::new()),
        index: index.clone(),
        broker: broker.clone(),
        auth,
    };
    let app = PlanApp::open_with(&config, collaborators)
        .await
        .expect("app should open");
    let router = app.router();
    TestApp {
        app,
        router,
        index,
        broker,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn etag(&self) -> String {
        self.headers
            .get("etag")
            .expect("response should carry an ETag")
            .to_str()
            .expect("ETag should be ASCII")
            .to_string()
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<String>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body)),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be valid JSON")
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn send_json(router: &Router, method: Method, uri: &str, headers: &[(&str, &str)], payload: &Value) -> TestResponse {
    send(router, method, uri, headers, Some(payload.to_string())).await
}

/// Polls until the index holds `expected` documents or two seconds pass.
pub async fn wait_for_count(index: &InMemorySearchIndex, name: &str, expected: usize) -> usize {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let count = index.count(name).await.unwrap_or(0);
        if count == expected || tokio::time::Instant::now() >= deadline {
            return count;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
