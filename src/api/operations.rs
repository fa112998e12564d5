//! Financial operation endpoints.
//!
//! A thin consumer of the auth core: every handler resolves the caller
//! to its own account and never touches another user's rows. Writes are
//! gated by the `operations.own.manage` permission carried by the
//! default USER role.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, Principal};
use crate::db::{Database, Operation, OperationFilter, OperationKind, PaymentMethod};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct OperationsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(OperationsState);

pub fn router(state: OperationsState) -> Router {
    Router::new()
        .route("/", post(create_operation))
        .route("/", get(list_operations))
        .route("/{uuid}", get(get_operation))
        .route("/{uuid}", put(update_operation))
        .route("/{uuid}", delete(delete_operation))
        .route("/{uuid}/restore", post(restore_operation))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationDto {
    id: String,
    kind: OperationKind,
    amount_minor: i64,
    currency: String,
    payment_method: PaymentMethod,
    description: String,
    notes: String,
    occurred_at: DateTime<Utc>,
    created_at: String,
}

impl From<Operation> for OperationDto {
    fn from(op: Operation) -> Self {
        Self {
            id: op.uuid,
            kind: op.kind,
            amount_minor: op.amount_minor,
            currency: op.currency,
            payment_method: op.payment_method,
            description: op.description,
            notes: op.notes,
            occurred_at: op.occurred_at,
            created_at: op.created_at,
        }
    }
}

/// Resolve the caller's internal row ID, enforcing the write permission.
async fn owner_id(state: &OperationsState, principal: &Principal) -> Result<i64, ApiError> {
    if !principal.has_permission("operations.own.manage") {
        return Err(ApiError::forbidden("Missing operations.own.manage permission"));
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&principal.user_id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::unauthorized("Unknown account"))?;
    if !user.is_active {
        return Err(ApiError::unauthorized("Account is deactivated"));
    }
    Ok(user.id)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOperationRequest {
    kind: OperationKind,
    amount_minor: i64,
    currency: String,
    #[serde(default = "default_payment_method")]
    payment_method: PaymentMethod,
    #[serde(default)]
    description: String,
    #[serde(default)]
    notes: String,
    occurred_at: Option<DateTime<Utc>>,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Card
}

async fn create_operation(
    State(state): State<OperationsState>,
    auth: Auth,
    Json(body): Json<CreateOperationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&state, &auth.principal).await?;

    if body.amount_minor <= 0 {
        return Err(ApiError::bad_request("Amount must be positive"));
    }
    let currency = body.currency.trim().to_uppercase();
    if currency.len() != 3 {
        return Err(ApiError::bad_request("Currency must be a 3-letter code"));
    }

    let uuid = Uuid::new_v4().to_string();
    state
        .db
        .operations()
        .create(
            &uuid,
            owner,
            body.kind,
            body.amount_minor,
            &currency,
            body.payment_method,
            body.description.trim(),
            body.notes.trim(),
            body.occurred_at.unwrap_or_else(Utc::now),
        )
        .await
        .db_err("Failed to create operation")?;

    let op = state
        .db
        .operations()
        .get(&uuid, owner)
        .await
        .db_err("Failed to load created operation")?
        .ok_or_else(|| ApiError::internal("Created operation vanished"))?;
    Ok((StatusCode::CREATED, Json(OperationDto::from(op))))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    kind: Option<OperationKind>,
    currency: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
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

async fn list_operations(
    State(state): State<OperationsState>,
    auth: Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&state, &auth.principal).await?;

    let filter = OperationFilter {
        kind: query.kind,
        currency: query.currency.map(|c| c.to_uppercase()),
        from: query.from,
        to: query.to,
        page: query.page,
        page_size: query.page_size.clamp(1, 200),
    };

    let operations = state
        .db
        .operations()
        .list(owner, &filter)
        .await
        .db_err("Failed to list operations")?;
    let dtos: Vec<OperationDto> = operations.into_iter().map(OperationDto::from).collect();
    Ok(Json(dtos))
}

async fn get_operation(
    State(state): State<OperationsState>,
    auth: Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&state, &auth.principal).await?;

    let op = state
        .db
        .operations()
        .get(&uuid, owner)
        .await
        .db_err("Failed to get operation")?
        .ok_or_else(|| ApiError::not_found("operation not found"))?;
    Ok(Json(OperationDto::from(op)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOperationRequest {
    amount_minor: Option<i64>,
    currency: Option<String>,
    payment_method: Option<PaymentMethod>,
    description: Option<String>,
    notes: Option<String>,
    occurred_at: Option<DateTime<Utc>>,
}

async fn update_operation(
    State(state): State<OperationsState>,
    auth: Auth,
    Path(uuid): Path<String>,
    Json(body): Json<UpdateOperationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&state, &auth.principal).await?;

    if let Some(amount) = body.amount_minor {
        if amount <= 0 {
            return Err(ApiError::bad_request("Amount must be positive"));
        }
    }
    let currency = body.currency.map(|c| c.trim().to_uppercase());
    if let Some(ref c) = currency {
        if c.len() != 3 {
            return Err(ApiError::bad_request("Currency must be a 3-letter code"));
        }
    }

    let changed = state
        .db
        .operations()
        .update(
            &uuid,
            owner,
            body.amount_minor,
            currency.as_deref(),
            body.payment_method,
            body.description.as_deref(),
            body.notes.as_deref(),
            body.occurred_at,
        )
        .await
        .db_err("Failed to update operation")?;
    if !changed {
        return Err(ApiError::not_found("operation not found"));
    }

    let op = state
        .db
        .operations()
        .get(&uuid, owner)
        .await
        .db_err("Failed to load updated operation")?
        .ok_or_else(|| ApiError::not_found("operation not found"))?;
    Ok(Json(OperationDto::from(op)))
}

async fn delete_operation(
    State(state): State<OperationsState>,
    auth: Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&state, &auth.principal).await?;

    let deleted = state
        .db
        .operations()
        .soft_delete(&uuid, owner)
        .await
        .db_err("Failed to delete operation")?;
    if !deleted {
        return Err(ApiError::not_found("operation not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn restore_operation(
    State(state): State<OperationsState>,
    auth: Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&state, &auth.principal).await?;

    let restored = state
        .db
        .operations()
        .restore(&uuid, owner)
        .await
        .db_err("Failed to restore operation")?;
    if !restored {
        return Err(ApiError::not_found("operation not found"));
    }

    let op = state
        .db
        .operations()
        .get(&uuid, owner)
        .await
        .db_err("Failed to load restored operation")?
        .ok_or_else(|| ApiError::not_found("operation not found"))?;
    Ok(Json(OperationDto::from(op)))
}
