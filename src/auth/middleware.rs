use std::future::Future;
use std::pin::Pin;

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::error::ApiError;

/// JWT claims extracted from the Authorization: Bearer header.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// User email
    pub email: String,
    /// Organization the user belongs to, if any
    #[serde(rename = "organizationId", default)]
    pub organization_id: Option<String>,
    /// Role within the organization
    #[serde(default)]
    pub role: Option<String>,
    /// Projects the user is a member of, known at token issue time
    #[serde(rename = "projectIds", default)]
    pub project_ids: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// JWT secret stored in request extensions for the Claims extractor
#[derive(Clone)]
pub struct JwtSecret(pub Vec<u8>);

/// Pull the bearer token out of the Authorization header, distinguishing
/// "no header" from "header without a token" (both UNAUTHORIZED).
fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized("No authorization header provided"))?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized("No token provided"))
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        // Get JWT secret from request extensions (set by middleware layer)
        let jwt_secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or(ApiError::AuthError)?;

        jwt::validate_access_token(&jwt_secret.0, token)
            .map_err(|e| jwt::classify_token_error(&e))
    }
}

/// Optional variant: endpoints that behave differently for anonymous vs.
/// authenticated callers. Missing or invalid credentials never fail the
/// request — the principal is simply left unset.
#[derive(Debug, Clone)]
pub struct OptionalClaims(pub Option<Claims>);

impl<S> FromRequestParts<S> for OptionalClaims
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalClaims(
            Claims::from_request_parts(parts, state).await.ok(),
        ))
    }
}

/// Role-gated middleware for use with `middleware::from_fn`.
/// An unauthenticated caller is rejected by the Claims extractor with
/// UNAUTHORIZED before this runs; an authenticated caller whose role is
/// not in `allowed` gets FORBIDDEN.
pub fn require_role(
    allowed: &'static [&'static str],
) -> impl Clone
       + Send
       + Sync
       + Fn(
    Claims,
    Request,
    Next,
) -> Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>> {
    move |claims, req, next| {
        Box::pin(async move {
            match claims.role.as_deref() {
                Some(role) if allowed.contains(&role) => Ok(next.run(req).await),
                _ => Err(ApiError::Forbidden),
            }
        })
    }
}
