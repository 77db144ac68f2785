pub mod jwt;
pub mod middleware;

/// Verified identity derived from a bearer credential.
/// Never stored — recomputed per request/connection from the token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub organization_id: Option<String>,
    pub role: Option<String>,
    /// Project memberships known at handshake time, used for
    /// room auto-join. Kept current by the identity service, not us.
    pub project_ids: Vec<String>,
}

impl From<middleware::Claims> for Principal {
    fn from(claims: middleware::Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            organization_id: claims.organization_id,
            role: claims.role,
            project_ids: claims.project_ids,
        }
    }
}
