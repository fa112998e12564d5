//! User administration and self-service endpoints.
//!
//! Listing and lookup are open to staff roles; role assignment and
//! deactivation require an administrator. Self-service profile and
//! password changes only touch the caller's own account.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, Auth, StaffOnly};
use crate::db::{Database, User};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::password;
use crate::service::{AuthService, UserView};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub service: AuthService,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/me", put(update_profile))
        .route("/me/password", post(change_password))
        .route("/{uuid}", get(get_user))
        .route("/{uuid}", delete(deactivate_user))
        .route("/{uuid}/verify-email", post(verify_email))
        .route("/{uuid}/roles", post(assign_role))
        .route("/{uuid}/roles/{code}", delete(remove_role))
        .with_state(state)
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

async fn fetch_user(state: &UsersState, uuid: &str) -> Result<User, ApiError> {
    state
        .db
        .users()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("user not found"))
}

/// List users with their roles.
async fn list_users(
    State(state): State<UsersState>,
    _auth: Auth<StaffOnly>,
    axum::extract::Query(query): axum::extract::Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list(query.page, query.page_size.clamp(1, 200))
        .await
        .db_err("Failed to list users")?;

    let mut views: Vec<UserView> = Vec::with_capacity(users.len());
    for user in &users {
        views.push(state.service.user_view(user).await.map_err(ApiError::from)?);
    }
    Ok(Json(views))
}

/// Get one user by UUID.
async fn get_user(
    State(state): State<UsersState>,
    _auth: Auth<StaffOnly>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = fetch_user(&state, &uuid).await?;
    let view = state.service.user_view(&user).await.map_err(ApiError::from)?;
    Ok(Json(view))
}

/// Deactivate an account (soft flag; the row is kept).
async fn deactivate_user(
    State(state): State<UsersState>,
    auth: Auth<AdminOnly>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if auth.principal.user_id == uuid {
        return Err(ApiError::bad_request("Cannot deactivate your own account"));
    }

    let changed = state
        .db
        .users()
        .set_active(&uuid, false)
        .await
        .db_err("Failed to deactivate user")?;
    if !changed {
        return Err(ApiError::not_found("user not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a user's email as verified.
async fn verify_email(
    State(state): State<UsersState>,
    _auth: Auth<AdminOnly>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let changed = state
        .db
        .users()
        .mark_verified(&uuid)
        .await
        .db_err("Failed to verify email")?;
    if !changed {
        return Err(ApiError::not_found("user not found"));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRoleRequest {
    role_code: String,
}

#[derive(Serialize)]
struct AssignRoleResponse {
    assigned: bool,
}

/// Assign a role to a user. Unknown codes and duplicate pairs are a
/// quiet `assigned: false`, not an error.
async fn assign_role(
    State(state): State<UsersState>,
    auth: Auth<AdminOnly>,
    Path(uuid): Path<String>,
    Json(body): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = fetch_user(&state, &uuid).await?;

    let assigned = state
        .db
        .roles()
        .assign(user.id, &body.role_code.to_uppercase(), &auth.principal.user_id)
        .await
        .db_err("Failed to assign role")?;
    Ok(Json(AssignRoleResponse { assigned }))
}

#[derive(Serialize)]
struct RemoveRoleResponse {
    removed: bool,
}

/// Remove a role from a user. A missing pair is `removed: false`.
async fn remove_role(
    State(state): State<UsersState>,
    _auth: Auth<AdminOnly>,
    Path((uuid, code)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let user = fetch_user(&state, &uuid).await?;

    let removed = state
        .db
        .roles()
        .remove(user.id, &code.to_uppercase())
        .await
        .db_err("Failed to remove role")?;
    Ok(Json(RemoveRoleResponse { removed }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    full_name: Option<String>,
    phone: Option<String>,
    settings: Option<serde_json::Value>,
}

/// Update the caller's own profile fields.
async fn update_profile(
    State(state): State<UsersState>,
    auth: Auth,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = body.settings.as_ref().map(|s| s.to_string());
    let changed = state
        .db
        .users()
        .update_profile(
            &auth.principal.user_id,
            body.full_name.as_deref(),
            body.phone.as_deref(),
            settings.as_deref(),
        )
        .await
        .db_err("Failed to update profile")?;
    if !changed {
        return Err(ApiError::not_found("user not found"));
    }

    let user = fetch_user(&state, &auth.principal.user_id).await?;
    let view = state.service.user_view(&user).await.map_err(ApiError::from)?;
    Ok(Json(view))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

/// Change the caller's password after verifying the current one.
async fn change_password(
    State(state): State<UsersState>,
    auth: Auth,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = fetch_user(&state, &auth.principal.user_id).await?;

    let valid = password::verify_password(&body.current_password, &user.password_hash)
        .map_err(ApiError::from)?;
    if !valid {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let hash = password::hash_password(&body.new_password).map_err(ApiError::from)?;
    state
        .db
        .users()
        .set_password_hash(&user.uuid, &hash)
        .await
        .db_err("Failed to change password")?;

    Ok(Json(serde_json::json!({ "success": true })))
}
