//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued elsewhere with `id`, `username`, `role` and
//! `exp` claims. This service only verifies them.

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{Principal, Role};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{HeaderMap, AUTHORIZATION};
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MISSING_TOKEN: &str = "Access token required";
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Turns a presented credential into a principal.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Fails with `Forbidden` when the token is invalid, expired or names an unknown role.
    async fn verify(&self, token: &str) -> Result<Principal, AppError>;
}

/// User ids are numeric in some issuers and strings in others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimId {
    Number(i64),
    Text(String),
}

impl ClaimId {
    fn into_string(self) -> String {
        match self {
            ClaimId::Number(n) => n.to_string(),
            ClaimId::Text(s) => s,
        }
    }
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: ClaimId,
    pub username: String,
    pub role: String,
    pub exp: u64,
}

/// Verifies HS256 tokens signed with a shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    fn verify_sync(&self, token: &str) -> Result<Principal, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!("Token rejected: {}", e);
            AppError::Forbidden(INVALID_TOKEN.to_string())
        })?;

        let claims = data.claims;
        let role = match claims.role.as_str() {
            "manager" => Role::Manager,
            "employee" => Role::Employee,
            other => {
                tracing::debug!("Token rejected: unknown role '{}'", other);
                return Err(AppError::Forbidden(INVALID_TOKEN.to_string()));
            }
        };

        Ok(Principal {
            id: claims.id.into_string(),
            username: claims.username,
            role,
        })
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AppError> {
        self.verify_sync(token)
    }
}

/// `Authorization: Bearer <token>`, scheme case-insensitive, whitespace trimmed.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let scheme = auth.get(..7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    let token = auth[7..].trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_string()))?;

        let principal = state.verifier.verify(&token).await?;
        tracing::debug!("Authenticated {} ({:?})", principal.username, principal.role);
        Ok(principal)
    }
}
