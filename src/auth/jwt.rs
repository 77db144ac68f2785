use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::middleware::Claims;
use crate::error::ApiError;

/// Validate an access token and return its claims.
pub fn validate_access_token(
    secret: &[u8],
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.leeway = 0;
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}

/// Map a token validation failure onto the error taxonomy.
/// Expiry is kept distinct from signature/format failures so clients
/// can prompt re-login only when the token has actually expired.
pub fn classify_token_error(err: &jsonwebtoken::errors::Error) -> ApiError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => ApiError::TokenExpired,
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => ApiError::InvalidToken,
        _ => ApiError::AuthError,
    }
}

/// Issue an access token for a user. The gateway itself never mints
/// tokens for clients — that is the auth backing service's job — but the
/// stub auth service and the integration tests both need one.
pub fn issue_access_token(
    secret: &[u8],
    user_id: &str,
    email: &str,
    organization_id: Option<&str>,
    role: Option<&str>,
    project_ids: &[&str],
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        organization_id: organization_id.map(str::to_string),
        role: role.map(str::to_string),
        project_ids: project_ids.iter().map(|p| p.to_string()).collect(),
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}
