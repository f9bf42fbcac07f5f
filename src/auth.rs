//! Bearer token verification.

use std::collections::HashSet;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::PlanError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl From<AuthError> for PlanError {
    fn from(err: AuthError) -> Self {
        PlanError::Unauthorized(err.to_string())
    }
}

#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;

    /// Whether requests without an `Authorization` header are accepted.
    fn allows_anonymous(&self) -> bool {
        false
    }
}

/// HS256 JWT verification with optional issuer/audience checks.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn hs256(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait]
impl AuthVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))
    }
}

/// Accepts every request; used when authentication is switched off.
#[derive(Debug, Default)]
pub struct AllowAllVerifier;

#[async_trait]
impl AuthVerifier for AllowAllVerifier {
    async fn verify(&self, _token: &str) -> Result<Claims, AuthError> {
        Ok(Self::anonymous())
    }

    fn allows_anonymous(&self) -> bool {
        true
    }
}

impl AllowAllVerifier {
    pub fn anonymous() -> Claims {
        Claims {
            sub: "anonymous".to_string(),
            exp: 0,
            iss: None,
            aud: None,
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
