//! HTTP surface for plan CRUD.
//!
//! Handlers stay thin: header and body parsing happen here, everything else
//! is delegated to [`PlanService`].

mod handlers;
mod middleware;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{Level, event};

use crate::auth::AuthVerifier;
use crate::core::PlanError;
use crate::service::PlanService;

pub use handlers::{EMPTY_BODY_MESSAGE, IF_MATCH_REQUIRED_MESSAGE};

#[derive(Clone)]
pub struct AppState {
    pub plans: PlanService,
    pub auth: Arc<dyn AuthVerifier>,
}

impl AppState {
    pub fn new(plans: PlanService, auth: Arc<dyn AuthVerifier>) -> Self {
        Self { plans, auth }
    }
}

pub fn build_router(state: AppState) -> Router {
    let plans = Router::new()
        .route("/v1/plan", post(handlers::create_plan))
        .route(
            "/v1/plan/:object_id",
            get(handlers::get_plan)
                .patch(handlers::patch_plan)
                .delete(handlers::delete_plan),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_bearer,
        ));

    Router::new()
        .route("/health", get(handlers::healthcheck))
        .merge(plans)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Plan(PlanError),
    Input(String),
}

impl From<PlanError> for WebError {
    fn from(err: PlanError) -> Self {
        WebError::Plan(err)
    }
}

impl WebError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    fn parts(self) -> (StatusCode, &'static str, String) {
        let message = match &self {
            WebError::Plan(err) => err.to_string(),
            WebError::Input(message) => message.clone(),
        };
        let (status, code) = match self {
            WebError::Input(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            WebError::Plan(PlanError::InvalidJson(_)) => (StatusCode::BAD_REQUEST, "invalid_json"),
            WebError::Plan(PlanError::Validation(_)) => (StatusCode::BAD_REQUEST, "schema_violation"),
            WebError::Plan(PlanError::ImmutableField(_)) => (StatusCode::BAD_REQUEST, "immutable_field"),
            WebError::Plan(PlanError::Unauthorized(_)) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            WebError::Plan(PlanError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            WebError::Plan(PlanError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            WebError::Plan(PlanError::PreconditionFailed(_)) => {
                (StatusCode::PRECONDITION_FAILED, "precondition_failed")
            }
            WebError::Plan(
                PlanError::Store(_)
                | PlanError::Index(_)
                | PlanError::Transport(_)
                | PlanError::Internal(_),
            ) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        (status, code, message)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            event!(Level::ERROR, code, error = %message, "request failed");
        }

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (PlanError::InvalidJson("x".into()), StatusCode::BAD_REQUEST),
            (PlanError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (PlanError::ImmutableField("objectId".into()), StatusCode::BAD_REQUEST),
            (PlanError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (PlanError::NotFound("p".into()), StatusCode::NOT_FOUND),
            (PlanError::Conflict("p".into()), StatusCode::CONFLICT),
            (PlanError::PreconditionFailed("x".into()), StatusCode::PRECONDITION_FAILED),
            (PlanError::Store("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(WebError::from(err).into_response().status(), expected);
        }
        assert_eq!(
            WebError::input("empty").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
