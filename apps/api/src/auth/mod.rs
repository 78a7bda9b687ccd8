//! Bearer-token authentication for the `/api` routes.

pub mod jwt;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::errors::AppError;
use crate::state::AppState;

pub use jwt::JwtService;

/// Authenticated caller, extracted from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        authenticate(header, &state.jwt)
    }
}

/// Accepts both "Bearer <token>" and a raw token.
fn authenticate(header: &str, jwt: &JwtService) -> Result<AuthUser, AppError> {
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    let claims = jwt.verify_token(token).map_err(|e| {
        debug!("Rejected bearer token: {e}");
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticate_with_bearer_prefix() {
        let jwt = JwtService::new("test_secret");
        let token = jwt.create_token("user-1", "alice").unwrap();
        let user = authenticate(&format!("Bearer {token}"), &jwt).unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_authenticate_raw_token() {
        let jwt = JwtService::new("test_secret");
        let token = jwt.create_token("user-2", "bob").unwrap();
        assert_eq!(authenticate(&token, &jwt).unwrap().user_id, "user-2");
    }

    #[test]
    fn test_authenticate_rejects_foreign_signature() {
        let issuer = JwtService::new("one_secret");
        let verifier = JwtService::new("another_secret");
        let token = issuer.create_token("user-3", "carol").unwrap();
        assert!(matches!(
            authenticate(&token, &verifier),
            Err(AppError::Unauthorized(_))
        ));
    }
}
