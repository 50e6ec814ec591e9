//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs issued by the users service and signed with the
//! shared `auth.jwt_secret`. The gateway only verifies them; the token
//! itself is forwarded so upstreams can make their own decisions.

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::http::response::GatewayError;

/// Claims carried by user tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric or string id, depending on the issuer.
    #[serde(rename = "userId")]
    pub user_id: serde_json::Value,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: u64,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Option<String>,
    pub bearer_token: String,
}

pub struct Authenticator {
    key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify the `Authorization: Bearer` header.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, GatewayError> {
        let token = bearer_token(headers).ok_or(GatewayError::MissingToken)?;

        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            GatewayError::InvalidToken
        })?;

        let user_id = match data.claims.user_id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };

        Ok(AuthContext {
            user_id,
            role: data.claims.role,
            bearer_token: token.to_string(),
        })
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
