mod auth;
mod error;
mod operations;
mod roles;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::service::AuthService;

pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    service: AuthService,
    secure_cookies: bool,
    refresh_token_days: i64,
) -> Router {
    let auth_state = auth::AuthApiState {
        service: service.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        refresh_token_days,
    };

    let users_state = users::UsersState {
        db: db.clone(),
        service,
        jwt: jwt.clone(),
        secure_cookies,
    };

    let roles_state = roles::RolesState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let operations_state = operations::OperationsState {
        db,
        jwt,
        secure_cookies,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
        .nest("/roles", roles::router(roles_state))
        .nest("/operations", operations::router(operations_state))
}
