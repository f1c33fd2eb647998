use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::app::AppState;
use crate::auth::models::{AdminUser, AuthenticatedUser};
use crate::error::AppError;

/// Pull the raw token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Access denied. No token provided.".into()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid token format.".into()))?;

    value
        .split_once(' ')
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid token format.".into()))
}

/// Guard: require a verified identity.
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        state.tokens.verify(token)
    }
}

/// Guard: require a verified identity holding the admin role.
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            return Err(AppError::Forbidden(
                "Access denied. Admin privileges required.".into(),
            ));
        }
        Ok(AdminUser(user))
    }
}
