//! Integration tests for user administration and self-service.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_user_listing_is_staff_only() {
    let (app, db) = create_test_app().await;
    let member = register(&app, "bob@example.com", "Secret123", "Bob").await;

    let denied = get(&app, "/api/users", Some(&member.cookie())).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let manager = register_with_role(&app, &db, "mgr@example.com", "Secret123", "MANAGER").await;
    let allowed = get(&app, "/api/users", Some(&manager.cookie())).await;
    assert_eq!(allowed.status(), StatusCode::OK);

    let body = body_json(allowed).await;
    let emails: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert!(emails.contains(&"bob@example.com"));
    assert!(emails.contains(&"mgr@example.com"));
}

#[tokio::test]
async fn test_manager_cannot_assign_roles() {
    let (app, db) = create_test_app().await;
    let manager = register_with_role(&app, &db, "mgr@example.com", "Secret123", "MANAGER").await;
    let member = register(&app, "bob@example.com", "Secret123", "Bob").await;

    let response = post_json(
        &app,
        &format!("/api/users/{}/roles", member.user_id),
        Some(&manager.cookie()),
        json!({ "roleCode": "ADMIN" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_deactivates_account() {
    let (app, db) = create_test_app().await;
    let admin = register_with_role(&app, &db, "admin@example.com", "Secret123", "ADMIN").await;
    let member = register(&app, "bob@example.com", "Secret123", "Bob").await;

    let response = delete(
        &app,
        &format!("/api/users/{}", member.user_id),
        &admin.cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Soft delete: the row survives, but login is refused.
    let user = db
        .users()
        .get_by_uuid(&member.user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!user.is_active);

    let login_attempt = post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": "bob@example.com", "password": "Secret123" }),
    )
    .await;
    assert_eq!(login_attempt.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_cannot_deactivate_self() {
    let (app, db) = create_test_app().await;
    let admin = register_with_role(&app, &db, "admin@example.com", "Secret123", "ADMIN").await;

    let response = delete(
        &app,
        &format!("/api/users/{}", admin.user_id),
        &admin.cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_own_profile() {
    let (app, _db) = create_test_app().await;
    let session = register(&app, "alice@example.com", "Secret123", "Alice").await;

    let response = put_json(
        &app,
        "/api/users/me",
        &session.cookie(),
        json!({ "fullName": "Alice Cooper", "settings": { "currency": "USD" } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["fullName"], "Alice Cooper");
    assert_eq!(body["settings"]["currency"], "USD");
}

#[tokio::test]
async fn test_change_password_requires_current() {
    let (app, _db) = create_test_app().await;
    let session = register(&app, "alice@example.com", "Secret123", "Alice").await;

    let wrong = post_json(
        &app,
        "/api/users/me/password",
        Some(&session.cookie()),
        json!({ "currentPassword": "nope", "newPassword": "Fresh456" }),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);

    let right = post_json(
        &app,
        "/api/users/me/password",
        Some(&session.cookie()),
        json!({ "currentPassword": "Secret123", "newPassword": "Fresh456" }),
    )
    .await;
    assert_eq!(right.status(), StatusCode::OK);

    // Old password no longer works, the new one does.
    let stale = post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": "alice@example.com", "password": "Secret123" }),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    login(&app, "alice@example.com", "Fresh456").await;
}
