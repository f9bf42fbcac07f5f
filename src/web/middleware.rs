use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::{AppState, WebError};
use crate::auth::{AllowAllVerifier, AuthError, bearer_token};
use crate::core::PlanError;

/// Verifies the bearer token and stores the resulting claims on the request.
pub async fn require_bearer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = match header.and_then(bearer_token) {
        Some(token) => state.auth.verify(token).await,
        None if state.auth.allows_anonymous() => Ok(AllowAllVerifier::anonymous()),
        None => Err(AuthError::MissingToken),
    };

    match claims {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(err) => WebError::from(PlanError::from(err)).into_response(),
    }
}
