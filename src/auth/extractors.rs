use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use tracing::{error, warn};

use super::jwt::JwtKeys;
use crate::{accounts::repo_types::AdminId, state::AppState};

pub const SUPER_ADMIN_CODE: &str = "strapi-super-admin";

/// Authenticated caller holding the super admin role.
#[derive(Debug, Clone, Copy)]
pub struct SuperAdmin(pub AdminId);

#[async_trait]
impl FromRequestParts<AppState> for SuperAdmin {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing Authorization header".to_string()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or((StatusCode::UNAUTHORIZED, "Invalid auth scheme".to_string()))?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|_| {
            warn!("invalid or expired token");
            (StatusCode::UNAUTHORIZED, "Invalid or expired token".to_string())
        })?;

        let allowed = state
            .roles
            .has_role_code(claims.sub, SUPER_ADMIN_CODE)
            .await
            .map_err(|e| {
                error!(error = %e, admin_id = claims.sub, "role check failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            })?;

        if !allowed {
            warn!(admin_id = claims.sub, "super admin role required");
            return Err((StatusCode::FORBIDDEN, "Super admin role required".to_string()));
        }

        Ok(SuperAdmin(claims.sub))
    }
}
