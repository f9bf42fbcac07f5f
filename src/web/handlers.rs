use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{ETAG, IF_MATCH, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use super::{AppState, Result, WebError};
use crate::core::PlanError;
use crate::store::{ReadOutcome, VersionToken};

pub const EMPTY_BODY_MESSAGE: &str = "Request body must be valid JSON and cannot be empty.";
pub const IF_MATCH_REQUIRED_MESSAGE: &str = "If-Match header is required";

pub async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn create_plan(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let payload = parse_body(&body)?;
    if payload.as_object().is_some_and(|map| map.is_empty()) {
        return Err(WebError::input(EMPTY_BODY_MESSAGE));
    }
    let created = state.plans.create(payload).await?;

    let body = json!({
        "message": "Plan successfully created.",
        "objectId": created.value.object_id,
    });
    Ok(with_etag((StatusCode::CREATED, Json(body)), &created.token))
}

pub async fn get_plan(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let if_none_match = header_str(&headers, IF_NONE_MATCH)
        .map(VersionToken::parse_list)
        .unwrap_or_default();

    match state.plans.get(&object_id, &if_none_match).await? {
        ReadOutcome::Unchanged(token) => Ok(with_etag(StatusCode::NOT_MODIFIED, &token)),
        ReadOutcome::Modified(current) => Ok(with_etag(Json(current.value), &current.token)),
    }
}

pub async fn patch_plan(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let if_match = header_str(&headers, IF_MATCH).and_then(VersionToken::parse);
    let patch = parse_body(&body)?;

    let updated = state
        .plans
        .patch(&object_id, &patch, if_match.as_ref())
        .await
        .map_err(|err| match err {
            PlanError::PreconditionFailed(_) if if_match.is_none() => {
                PlanError::PreconditionFailed(IF_MATCH_REQUIRED_MESSAGE.to_string())
            }
            other => other,
        })?;
    Ok(with_etag(Json(updated.value), &updated.token))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
) -> Result<StatusCode> {
    state.plans.delete(&object_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_body(body: &Bytes) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(WebError::input(EMPTY_BODY_MESSAGE));
    }
    let value: Value = serde_json::from_slice(body).map_err(PlanError::from)?;
    if value.is_null() {
        return Err(WebError::input(EMPTY_BODY_MESSAGE));
    }
    Ok(value)
}

fn header_str(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn with_etag(response: impl IntoResponse, token: &VersionToken) -> Response {
    let mut response = response.into_response();
    if let Ok(value) = HeaderValue::from_str(&token.header_value()) {
        response.headers_mut().insert(ETAG, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bodies_are_rejected() {
        for raw in ["", "  \n", "null"] {
            let err = parse_body(&Bytes::from(raw)).unwrap_err();
            assert!(matches!(err, WebError::Input(_)), "{raw:?}");
        }
    }

    #[test]
    fn empty_object_parses_for_patch() {
        let value = parse_body(&Bytes::from("{}")).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = parse_body(&Bytes::from("{\"objectId\":")).unwrap_err();
        assert!(matches!(err, WebError::Plan(PlanError::InvalidJson(_))));
    }
}
