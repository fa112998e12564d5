//! Role management and permission query endpoints.
//!
//! Reads are open to any authenticated user; mutations require the
//! `roles.manage` permission. System roles reject mutation and deletion
//! outright, and a custom role still assigned to users cannot be
//! deleted.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, Principal, StaffOnly};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::service::RoleView;

#[derive(Clone)]
pub struct RolesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(RolesState);

pub fn router(state: RolesState) -> Router {
    Router::new()
        .route("/", get(list_roles))
        .route("/", post(create_role))
        .route("/{uuid}", get(get_role))
        .route("/{uuid}", put(update_role))
        .route("/{uuid}", delete(delete_role))
        .route("/by-code/{code}", get(get_role_by_code))
        .route("/users/{uuid}/permissions", get(user_permissions))
        .route("/users/{uuid}/permissions/{permission}", get(user_has_permission))
        .with_state(state)
}

/// Permission gate for role mutations.
fn require_role_management(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_permission("roles.manage") {
        Ok(())
    } else {
        Err(ApiError::forbidden("Missing roles.manage permission"))
    }
}

async fn list_roles(
    State(state): State<RolesState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let roles = state.db.roles().list().await.db_err("Failed to list roles")?;
    let views: Vec<RoleView> = roles.into_iter().map(RoleView::from).collect();
    Ok(Json(views))
}

async fn get_role(
    State(state): State<RolesState>,
    _auth: Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let role = state
        .db
        .roles()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get role")?
        .ok_or_else(|| ApiError::not_found("role not found"))?;
    Ok(Json(RoleView::from(role)))
}

async fn get_role_by_code(
    State(state): State<RolesState>,
    _auth: Auth,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let role = state
        .db
        .roles()
        .get_by_code(&code.to_uppercase())
        .await
        .db_err("Failed to get role")?
        .ok_or_else(|| ApiError::not_found("role not found"))?;
    Ok(Json(RoleView::from(role)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoleRequest {
    name: String,
    code: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Create a custom role. Codes are stored upper-case.
async fn create_role(
    State(state): State<RolesState>,
    auth: Auth,
    Json(body): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role_management(&auth.principal)?;

    let code = body.code.trim().to_uppercase();
    if code.is_empty() || body.name.trim().is_empty() {
        return Err(ApiError::bad_request("Role code and name are required"));
    }

    if state
        .db
        .roles()
        .get_by_code(&code)
        .await
        .db_err("Failed to check role code")?
        .is_some()
    {
        return Err(ApiError::conflict("Role with this code already exists"));
    }

    let uuid = Uuid::new_v4().to_string();
    state
        .db
        .roles()
        .create(&uuid, &code, body.name.trim(), &body.description, &body.permissions)
        .await
        .db_err("Failed to create role")?;

    let role = state
        .db
        .roles()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to load created role")?
        .ok_or_else(|| ApiError::internal("Created role vanished"))?;
    Ok((StatusCode::CREATED, Json(RoleView::from(role))))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRoleRequest {
    name: Option<String>,
    description: Option<String>,
    permissions: Option<Vec<String>>,
}

async fn update_role(
    State(state): State<RolesState>,
    auth: Auth,
    Path(uuid): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role_management(&auth.principal)?;

    let role = state
        .db
        .roles()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get role")?
        .ok_or_else(|| ApiError::not_found("role not found"))?;
    if role.is_system {
        return Err(ApiError::bad_request("Cannot modify system role"));
    }

    state
        .db
        .roles()
        .update(
            &uuid,
            body.name.as_deref(),
            body.description.as_deref(),
            body.permissions.as_deref(),
        )
        .await
        .db_err("Failed to update role")?;

    let role = state
        .db
        .roles()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to load updated role")?
        .ok_or_else(|| ApiError::not_found("role not found"))?;
    Ok(Json(RoleView::from(role)))
}

/// Delete a custom role. System roles and roles still assigned to any
/// user are rejected.
async fn delete_role(
    State(state): State<RolesState>,
    auth: Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_role_management(&auth.principal)?;

    let role = state
        .db
        .roles()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get role")?
        .ok_or_else(|| ApiError::not_found("role not found"))?;
    if role.is_system {
        return Err(ApiError::bad_request("Cannot delete system role"));
    }

    let assignments = state
        .db
        .roles()
        .assignment_count(role.id)
        .await
        .db_err("Failed to count assignments")?;
    if assignments > 0 {
        return Err(ApiError::bad_request(
            "Cannot delete a role that is still assigned to users",
        ));
    }

    state
        .db
        .roles()
        .delete(&uuid)
        .await
        .db_err("Failed to delete role")?;
    Ok(StatusCode::NO_CONTENT)
}

/// All permissions of a user, resolved from current assignments rather
/// than from anyone's token claims.
async fn user_permissions(
    State(state): State<RolesState>,
    _auth: Auth<StaffOnly>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let permissions = state
        .db
        .roles()
        .permissions_of(user.id)
        .await
        .db_err("Failed to resolve permissions")?;

    Ok(Json(serde_json::json!({
        "userId": uuid,
        "permissions": permissions,
    })))
}

/// Point permission check against the resolver.
async fn user_has_permission(
    State(state): State<RolesState>,
    _auth: Auth<StaffOnly>,
    Path((uuid, permission)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let has_permission = state
        .db
        .roles()
        .has_permission(user.id, &permission)
        .await
        .db_err("Failed to resolve permission")?;

    Ok(Json(serde_json::json!({
        "userId": uuid,
        "permission": permission,
        "hasPermission": has_permission,
    })))
}
