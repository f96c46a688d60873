//! Bearer-token authentication.
//!
//! [`JwtKeys::authenticate`] is a pure function from a raw token to a
//! [`Principal`]; [`require_auth`] runs it per request and hands the result to
//! handlers as an `Extension<Principal>`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use common::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user's id.
    pub sub: String,
    pub role: String,
    /// Expiry as seconds since the epoch.
    pub exp: i64,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,

    #[error("authorization header must be a bearer token")]
    MalformedHeader,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("invalid token subject: {0}")]
    InvalidSubject(String),
}

/// HS256 keys derived from one shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<KeyPair>,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            inner: Arc::new(KeyPair {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
        }
    }

    /// Signs a token for `user_id` valid for `ttl`.
    pub fn issue(&self, user_id: UserId, role: &str, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.inner.encoding,
        )?)
    }

    /// Verifies signature and expiry and resolves the caller.
    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &self.inner.decoding,
            &Validation::new(Algorithm::HS256),
        )?;

        let user_id = data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidSubject(data.claims.sub.clone()))?;

        Ok(Principal {
            user_id,
            role: data.claims.role,
        })
    }
}

/// Returns the token of an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?;

    let header = header.to_str().map_err(|_| AuthError::MalformedHeader)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

/// Rejects requests without a valid token; otherwise stores the
/// [`Principal`] in the request extensions.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = extract_bearer(req.headers())
        .and_then(|token| keys.authenticate(token))
        .inspect_err(|e| tracing::debug!(error = %e, "authentication failed"))?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
