//! Gateway error taxonomy. Every failure is rendered as the standard
//! response envelope with a stable machine-readable code so clients can
//! react programmatically (e.g. prompt re-login only on TOKEN_EXPIRED).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::envelope::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential supplied at all.
    #[error("{0}")]
    Unauthorized(&'static str),
    /// Credential present but the signature or format is invalid.
    #[error("Invalid token")]
    InvalidToken,
    /// Credential was valid once but has expired.
    #[error("Token expired")]
    TokenExpired,
    /// Authenticated, but the role is not in the allowed set.
    #[error("Insufficient permissions")]
    Forbidden,
    /// Unmatched route.
    #[error("Route not found")]
    NotFound,
    /// Unexpected failure during credential verification.
    #[error("Authentication error")]
    AuthError,
    /// Client identity exceeded the configured request budget.
    #[error("Too many requests from this IP, please try again later.")]
    RateLimited,
    /// Body or parameters the gateway could not parse.
    #[error("{0}")]
    BadRequest(&'static str),
    /// Anything a handler could not recover from.
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Stable error code carried in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::AuthError => "AUTH_ERROR",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::InvalidToken | ApiError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthError | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::failure(self.code(), &self.to_string());
        (self.status(), Json(body)).into_response()
    }
}
