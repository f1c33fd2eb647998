use axum::extract::{Path, State};
use axum::Json;
use bson::oid::ObjectId;
use serde::Deserialize;

use crate::api::auth::{hash_blocking, normalize_email, verify_blocking};
use crate::api::documents::{parse_id, MessageResponse};
use crate::app::AppState;
use crate::auth::models::{AdminUser, AuthenticatedUser, Role};
use crate::db::models::UserResponse;
use crate::db::user_repository::{UserPatch, UserRepository};
use crate::error::AppError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Admin edit of any account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub profile_image_url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<UpdateProfileRequest> for UserPatch {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            full_name: non_blank(req.full_name),
            profile_image_url: non_blank(req.profile_image_url),
            ..Self::default()
        }
    }
}

impl TryFrom<AdminUpdateUserRequest> for UserPatch {
    type Error = AppError;

    fn try_from(req: AdminUpdateUserRequest) -> Result<Self, Self::Error> {
        let role = match non_blank(req.role) {
            Some(role) => Some(Role::from_str_ci(&role).ok_or_else(|| {
                AppError::BadRequest(format!("Invalid role '{role}'. Expected: user, admin"))
            })?),
            None => None,
        };

        Ok(Self {
            full_name: non_blank(req.full_name),
            email: non_blank(req.email).map(|e| normalize_email(&e)),
            role,
            profile_image_url: non_blank(req.profile_image_url),
            password_hash: None,
        })
    }
}

async fn update_user(
    users: &dyn UserRepository,
    id: ObjectId,
    patch: &UserPatch,
) -> Result<UserResponse, AppError> {
    users
        .update_one(id, patch)
        .await?
        .map(UserResponse::from)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn change_password(
    users: &dyn UserRepository,
    id: ObjectId,
    request: ChangePasswordRequest,
) -> Result<(), AppError> {
    if request.new_password.is_empty() {
        return Err(AppError::BadRequest("New password is required".into()));
    }

    let user = users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !verify_blocking(user.password_hash, request.current_password).await? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }

    let patch = UserPatch {
        password_hash: Some(hash_blocking(request.new_password).await?),
        ..UserPatch::default()
    };
    update_user(users, id, &patch).await?;
    Ok(())
}

/// Apply an admin edit, refusing to move an account onto an email that
/// another account already uses.
pub async fn admin_update(
    users: &dyn UserRepository,
    id: ObjectId,
    request: AdminUpdateUserRequest,
) -> Result<UserResponse, AppError> {
    let patch = UserPatch::try_from(request)?;

    if let Some(email) = &patch.email {
        if let Some(existing) = users.find_by_email(email).await? {
            if existing.id != Some(id) {
                return Err(AppError::BadRequest("Email is already in use".into()));
            }
        }
    }

    update_user(users, id, &patch).await
}

/// Axum handler for `GET /api/users/profile`.
pub async fn profile_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AppError> {
    let record = state
        .user_repo
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(record.into()))
}

/// Axum handler for `PATCH /api/users/profile`.
pub async fn update_profile_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let patch = UserPatch::from(request);
    let updated = update_user(state.user_repo.as_ref(), user.user_id, &patch).await?;
    Ok(Json(updated))
}

/// Axum handler for `POST /api/users/change-password`.
pub async fn change_password_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    change_password(state.user_repo.as_ref(), user.user_id, request).await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully".into(),
    }))
}

/// Axum handler for `GET /api/users`. Admin only.
pub async fn list_users_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.user_repo.find_all().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Axum handler for `GET /api/users/{id}`. Admin only.
pub async fn get_user_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let id = parse_id(&id, "User")?;
    let record = state
        .user_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(record.into()))
}

/// Axum handler for `PATCH /api/users/{id}`. Admin only.
pub async fn update_user_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(request): Json<AdminUpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let id = parse_id(&id, "User")?;
    let updated = admin_update(state.user_repo.as_ref(), id, request).await?;
    Ok(Json(updated))
}

/// Axum handler for `DELETE /api/users/{id}`. Admin only.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id, "User")?;
    if state.user_repo.delete_one(id).await? == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }

    tracing::info!("User {id} deleted by admin {}", admin.user_id);
    Ok(Json(MessageResponse {
        message: "User deleted successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::db::models::UserRecord;
    use crate::test_support::MockUserRepo;

    async fn seed(users: &MockUserRepo, email: &str, password: &str) -> ObjectId {
        let user = UserRecord::new(
            "Grace Hopper".into(),
            email.into(),
            hash_password(password).unwrap(),
        );
        users.insert(&user).await.unwrap()
    }

    #[test]
    fn test_profile_patch_ignores_blanks() {
        let patch = UserPatch::from(UpdateProfileRequest {
            full_name: Some("   ".into()),
            profile_image_url: Some(" https://img.example/me.png ".into()),
        });
        assert_eq!(patch.full_name, None);
        assert_eq!(
            patch.profile_image_url.as_deref(),
            Some("https://img.example/me.png")
        );
        assert_eq!(patch.role, None);
    }

    #[test]
    fn test_admin_patch_parses_role() {
        let patch = UserPatch::try_from(AdminUpdateUserRequest {
            role: Some("Admin".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch.role, Some(Role::Admin));

        let invalid = UserPatch::try_from(AdminUpdateUserRequest {
            role: Some("superuser".into()),
            ..Default::default()
        });
        assert!(matches!(invalid, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_change_password() {
        let users = MockUserRepo::new();
        let id = seed(&users, "grace@example.com", "old-secret").await;

        let wrong = change_password(
            &users,
            id,
            ChangePasswordRequest {
                current_password: "nope".into(),
                new_password: "new-secret".into(),
            },
        )
        .await;
        assert!(matches!(wrong, Err(AppError::BadRequest(_))));

        change_password(
            &users,
            id,
            ChangePasswordRequest {
                current_password: "old-secret".into(),
                new_password: "new-secret".into(),
            },
        )
        .await
        .unwrap();

        let stored = users.find_by_id(id).await.unwrap().unwrap();
        assert!(crate::auth::password::verify_password(
            &stored.password_hash,
            "new-secret"
        ));
    }

    #[tokio::test]
    async fn test_admin_update_rejects_taken_email() {
        let users = MockUserRepo::new();
        let first = seed(&users, "first@example.com", "pw").await;
        seed(&users, "second@example.com", "pw").await;

        let result = admin_update(
            &users,
            first,
            AdminUpdateUserRequest {
                email: Some("Second@example.com".into()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let updated = admin_update(
            &users,
            first,
            AdminUpdateUserRequest {
                role: Some("admin".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let users = MockUserRepo::new();
        let result = admin_update(&users, ObjectId::new(), AdminUpdateUserRequest::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
