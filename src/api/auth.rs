//! Authentication API endpoints.
//!
//! - POST `/register` - Create an account and start a session
//! - POST `/login` - Exchange credentials for a token pair
//! - POST `/refresh` - Rotate a refresh token into a new pair
//! - POST `/logout` - Revoke the refresh token and clear cookies
//! - GET `/me` - Current user, re-read from the store

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, REFRESH_COOKIE_NAME, auth_cookie, clear_cookie, get_cookie,
};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::service::{AuthResponse, AuthService};

#[derive(Clone)]
pub struct AuthApiState {
    pub service: AuthService,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub refresh_token_days: i64,
}

impl_has_auth_backend!(AuthApiState);

pub fn router(state: AuthApiState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    password: String,
    full_name: String,
    #[serde(default)]
    phone: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

/// Set-Cookie headers carrying a fresh token pair.
fn session_cookies(
    response: &AuthResponse,
    secure: bool,
    refresh_token_days: i64,
) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    let access_max_age = (response.expires_at - Utc::now()).num_seconds().max(0);
    AppendHeaders([
        (
            SET_COOKIE,
            auth_cookie(ACCESS_COOKIE_NAME, &response.access_token, access_max_age, secure),
        ),
        (
            SET_COOKIE,
            auth_cookie(
                REFRESH_COOKIE_NAME,
                &response.refresh_token,
                refresh_token_days * 24 * 60 * 60,
                secure,
            ),
        ),
    ])
}

/// Set-Cookie headers clearing both tokens.
fn cleared_cookies(secure: bool) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, secure)),
        (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, secure)),
    ])
}

/// Register a new user. The response is a live session: tokens in the
/// body and in httpOnly cookies.
async fn register(
    State(state): State<AuthApiState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let response = state
        .service
        .register(body.email.trim(), &body.password, &body.full_name, &body.phone)
        .await?;

    let cookies = session_cookies(&response, state.secure_cookies, state.refresh_token_days);
    Ok((StatusCode::CREATED, cookies, Json(response)))
}

/// Log in with email and password.
async fn login(
    State(state): State<AuthApiState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.login(body.email.trim(), &body.password).await?;

    let cookies = session_cookies(&response, state.secure_cookies, state.refresh_token_days);
    Ok((StatusCode::OK, cookies, Json(response)))
}

/// Rotate the refresh token. The token is read from the cookie, with a
/// JSON body fallback for non-browser clients.
async fn refresh(
    State(state): State<AuthApiState>,
    request: axum::extract::Request,
) -> Result<impl IntoResponse, ApiError> {
    let (parts, body) = request.into_parts();

    let presented = match get_cookie(&parts.headers, REFRESH_COOKIE_NAME) {
        Some(token) => token.to_string(),
        None => refresh_token_from_body(body)
            .await
            .ok_or_else(|| ApiError::unauthorized("No refresh token"))?,
    };

    let response = state.service.refresh(&presented).await?;

    let cookies = session_cookies(&response, state.secure_cookies, state.refresh_token_days);
    Ok((StatusCode::OK, cookies, Json(response)))
}

/// Log out: revoke the refresh token (idempotent) and clear cookies.
async fn logout(
    State(state): State<AuthApiState>,
    request: axum::extract::Request,
) -> Result<impl IntoResponse, ApiError> {
    let (parts, body) = request.into_parts();

    let presented = match get_cookie(&parts.headers, REFRESH_COOKIE_NAME) {
        Some(token) => Some(token.to_string()),
        None => refresh_token_from_body(body).await,
    };

    let revoked = match presented {
        Some(token) => state.service.revoke_token(&token).await?,
        None => false,
    };

    Ok((
        StatusCode::OK,
        cleared_cookies(state.secure_cookies),
        Json(serde_json::json!({ "success": true, "revoked": revoked })),
    ))
}

/// Current user, resolved from the store rather than trusted from the
/// token's embedded claims.
async fn me(
    State(state): State<AuthApiState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.service.current_user(&auth.principal.user_id).await?;
    Ok(Json(user))
}

async fn refresh_token_from_body(body: axum::body::Body) -> Option<String> {
    let bytes = axum::body::to_bytes(body, 64 * 1024).await.ok()?;
    if bytes.is_empty() {
        return None;
    }
    let parsed: RefreshRequest = serde_json::from_slice(&bytes).ok()?;
    Some(parsed.refresh_token)
}
