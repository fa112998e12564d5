#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use finchbook::{ServerConfig, create_app, db::Database};
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &[u8] = b"test-jwt-secret-long-enough-for-tests";
pub const TEST_ISSUER: &str = "finchbook";
pub const TEST_AUDIENCE: &str = "finchbook-web";

/// Create a test app backed by an in-memory database.
pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_JWT_SECRET.to_vec(),
        issuer: TEST_ISSUER.to_string(),
        audience: TEST_AUDIENCE.to_string(),
        access_token_minutes: 15,
        refresh_token_days: 7,
        secure_cookies: false, // Tests run without HTTPS
    };
    (create_app(&config), db)
}

/// POST a JSON body, optionally with a Cookie header.
pub async fn post_json(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// PUT a JSON body with a Cookie header.
pub async fn put_json(
    app: &Router,
    uri: &str,
    cookie: &str,
    body: serde_json::Value,
) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header("content-type", "application/json")
                .header("cookie", cookie)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// GET, optionally with a Cookie header.
pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// DELETE with a Cookie header.
pub async fn delete(app: &Router, uri: &str, cookie: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header("cookie", cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extract Set-Cookie headers from a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check whether the response clears a cookie (Max-Age=0).
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{name}=")) && c.contains("Max-Age=0"))
}

/// Check whether the response sets a non-empty cookie.
pub fn has_set_cookie(cookies: &[String], name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{name}=")) && !c.contains("Max-Age=0"))
}

/// Format a Cookie header with both auth tokens.
pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!("access_token={access_token}; refresh_token={refresh_token}")
}

/// An authenticated session obtained through the real HTTP flow.
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

impl Session {
    pub fn cookie(&self) -> String {
        auth_cookies(&self.access_token, &self.refresh_token)
    }

    fn from_auth_response(body: &serde_json::Value) -> Self {
        Self {
            access_token: body["accessToken"].as_str().unwrap().to_string(),
            refresh_token: body["refreshToken"].as_str().unwrap().to_string(),
            user_id: body["user"]["id"].as_str().unwrap().to_string(),
        }
    }
}

/// Register a user through the API and return its session.
pub async fn register(app: &Router, email: &str, password: &str, full_name: &str) -> Session {
    let response = post_json(
        app,
        "/api/auth/register",
        None,
        serde_json::json!({
            "email": email,
            "password": password,
            "fullName": full_name,
        }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    Session::from_auth_response(&body_json(response).await)
}

/// Log a user in through the API and return its session.
pub async fn login(app: &Router, email: &str, password: &str) -> Session {
    let response = post_json(
        app,
        "/api/auth/login",
        None,
        serde_json::json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    Session::from_auth_response(&body_json(response).await)
}

/// Register a user, grant it an extra role directly in the store, and
/// log in again so the new role is present in the claims.
pub async fn register_with_role(
    app: &Router,
    db: &Database,
    email: &str,
    password: &str,
    role_code: &str,
) -> Session {
    let session = register(app, email, password, "Test User").await;
    let user = db
        .users()
        .get_by_uuid(&session.user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(
        db.roles()
            .assign(user.id, role_code, &session.user_id)
            .await
            .unwrap()
    );
    login(app, email, password).await
}
