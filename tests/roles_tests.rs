//! Integration tests for role management and permission resolution.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_roles_require_authentication() {
    let (app, _db) = create_test_app().await;

    let response = get(&app, "/api/roles", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_seeded_system_roles_are_listed() {
    let (app, _db) = create_test_app().await;
    let session = register(&app, "alice@example.com", "Secret123", "Alice").await;

    let response = get(&app, "/api/roles", Some(&session.cookie())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let codes: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["code"].as_str().unwrap())
        .collect();
    for code in ["SUPER_ADMIN", "ADMIN", "MANAGER", "USER"] {
        assert!(codes.contains(&code), "missing system role {code}");
    }
    assert!(
        body.as_array()
            .unwrap()
            .iter()
            .all(|r| r["isSystem"] == true)
    );
}

#[tokio::test]
async fn test_regular_user_cannot_mutate_roles() {
    let (app, _db) = create_test_app().await;
    let session = register(&app, "alice@example.com", "Secret123", "Alice").await;

    let response = post_json(
        &app,
        "/api/roles",
        Some(&session.cookie()),
        json!({ "name": "Auditor", "code": "AUDITOR" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_manages_custom_role() {
    let (app, db) = create_test_app().await;
    let admin = register_with_role(&app, &db, "admin@example.com", "Secret123", "ADMIN").await;

    // Create
    let created = post_json(
        &app,
        "/api/roles",
        Some(&admin.cookie()),
        json!({
            "name": "Auditor",
            "code": "auditor",
            "description": "Read-only reviewer",
            "permissions": ["reports.view"],
        }),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let role = body_json(created).await;
    assert_eq!(role["code"], "AUDITOR"); // codes are upper-cased
    assert_eq!(role["isSystem"], false);
    let role_id = role["id"].as_str().unwrap().to_string();

    // Update
    let updated = put_json(
        &app,
        &format!("/api/roles/{role_id}"),
        &admin.cookie(),
        json!({ "permissions": ["reports.view", "analytics.view"] }),
    )
    .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let updated_role = body_json(updated).await;
    assert_eq!(updated_role["permissions"].as_array().unwrap().len(), 2);

    // Delete
    let deleted = delete(&app, &format!("/api/roles/{role_id}"), &admin.cookie()).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = get(
        &app,
        &format!("/api/roles/{role_id}"),
        Some(&admin.cookie()),
    )
    .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_role_code_conflicts() {
    let (app, db) = create_test_app().await;
    let admin = register_with_role(&app, &db, "admin@example.com", "Secret123", "ADMIN").await;

    let first = post_json(
        &app,
        "/api/roles",
        Some(&admin.cookie()),
        json!({ "name": "Auditor", "code": "AUDITOR" }),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = post_json(
        &app,
        "/api/roles",
        Some(&admin.cookie()),
        json!({ "name": "Other", "code": "AUDITOR" }),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_system_roles_are_immutable() {
    let (app, db) = create_test_app().await;
    let admin = register_with_role(&app, &db, "admin@example.com", "Secret123", "ADMIN").await;

    let user_role = db.roles().get_by_code("USER").await.unwrap().unwrap();

    let update = put_json(
        &app,
        &format!("/api/roles/{}", user_role.uuid),
        &admin.cookie(),
        json!({ "name": "Hijacked" }),
    )
    .await;
    assert_eq!(update.status(), StatusCode::BAD_REQUEST);
    let body = body_json(update).await;
    assert!(body["error"].as_str().unwrap().contains("system role"));

    let del = delete(
        &app,
        &format!("/api/roles/{}", user_role.uuid),
        &admin.cookie(),
    )
    .await;
    assert_eq!(del.status(), StatusCode::BAD_REQUEST);

    // Unchanged.
    let still = db.roles().get_by_code("USER").await.unwrap().unwrap();
    assert_eq!(still.name, "User");
}

#[tokio::test]
async fn test_assigned_role_cannot_be_deleted() {
    let (app, db) = create_test_app().await;
    let admin = register_with_role(&app, &db, "admin@example.com", "Secret123", "ADMIN").await;
    let member = register(&app, "bob@example.com", "Secret123", "Bob").await;

    let created = post_json(
        &app,
        "/api/roles",
        Some(&admin.cookie()),
        json!({ "name": "Auditor", "code": "AUDITOR" }),
    )
    .await;
    let role_id = body_json(created).await["id"].as_str().unwrap().to_string();

    // Assign it to Bob through the users API.
    let assigned = post_json(
        &app,
        &format!("/api/users/{}/roles", member.user_id),
        Some(&admin.cookie()),
        json!({ "roleCode": "AUDITOR" }),
    )
    .await;
    assert_eq!(assigned.status(), StatusCode::OK);
    assert_eq!(body_json(assigned).await["assigned"], true);

    let del = delete(&app, &format!("/api/roles/{role_id}"), &admin.cookie()).await;
    assert_eq!(del.status(), StatusCode::BAD_REQUEST);
    let body = body_json(del).await;
    assert!(body["error"].as_str().unwrap().contains("still assigned"));

    // After unassigning, deletion goes through.
    let removed = delete(
        &app,
        &format!("/api/users/{}/roles/AUDITOR", member.user_id),
        &admin.cookie(),
    )
    .await;
    assert_eq!(body_json(removed).await["removed"], true);

    let del = delete(&app, &format!("/api/roles/{role_id}"), &admin.cookie()).await;
    assert_eq!(del.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_role_assignment_is_quietly_idempotent() {
    let (app, db) = create_test_app().await;
    let admin = register_with_role(&app, &db, "admin@example.com", "Secret123", "ADMIN").await;
    let member = register(&app, "bob@example.com", "Secret123", "Bob").await;

    // Unknown role code: no error, just assigned=false.
    let unknown = post_json(
        &app,
        &format!("/api/users/{}/roles", member.user_id),
        Some(&admin.cookie()),
        json!({ "roleCode": "NO_SUCH_ROLE" }),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::OK);
    assert_eq!(body_json(unknown).await["assigned"], false);

    // Duplicate pair: assigned=false the second time.
    let first = post_json(
        &app,
        &format!("/api/users/{}/roles", member.user_id),
        Some(&admin.cookie()),
        json!({ "roleCode": "MANAGER" }),
    )
    .await;
    assert_eq!(body_json(first).await["assigned"], true);

    let second = post_json(
        &app,
        &format!("/api/users/{}/roles", member.user_id),
        Some(&admin.cookie()),
        json!({ "roleCode": "MANAGER" }),
    )
    .await;
    assert_eq!(body_json(second).await["assigned"], false);

    // Removing twice: removed=true then false.
    let removed = delete(
        &app,
        &format!("/api/users/{}/roles/MANAGER", member.user_id),
        &admin.cookie(),
    )
    .await;
    assert_eq!(body_json(removed).await["removed"], true);

    let removed_again = delete(
        &app,
        &format!("/api/users/{}/roles/MANAGER", member.user_id),
        &admin.cookie(),
    )
    .await;
    assert_eq!(body_json(removed_again).await["removed"], false);
}

#[tokio::test]
async fn test_permission_queries_resolve_from_store() {
    let (app, db) = create_test_app().await;
    let admin = register_with_role(&app, &db, "admin@example.com", "Secret123", "ADMIN").await;
    let member = register(&app, "bob@example.com", "Secret123", "Bob").await;

    // USER role grants operations.own.manage but not users.manage.
    let granted = get(
        &app,
        &format!(
            "/api/roles/users/{}/permissions/operations.own.manage",
            member.user_id
        ),
        Some(&admin.cookie()),
    )
    .await;
    assert_eq!(body_json(granted).await["hasPermission"], true);

    let denied = get(
        &app,
        &format!("/api/roles/users/{}/permissions/users.manage", member.user_id),
        Some(&admin.cookie()),
    )
    .await;
    assert_eq!(body_json(denied).await["hasPermission"], false);

    // Wildcard grants everything.
    let root = register_with_role(&app, &db, "root@example.com", "Secret123", "SUPER_ADMIN").await;
    let anything = get(
        &app,
        &format!(
            "/api/roles/users/{}/permissions/made.up.permission",
            root.user_id
        ),
        Some(&admin.cookie()),
    )
    .await;
    assert_eq!(body_json(anything).await["hasPermission"], true);

    // Full permission list is the union across roles.
    let list = get(
        &app,
        &format!("/api/roles/users/{}/permissions", member.user_id),
        Some(&admin.cookie()),
    )
    .await;
    let body = body_json(list).await;
    let permissions: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert!(permissions.contains(&"operations.own.manage"));
    assert!(permissions.contains(&"tags.own.manage"));
}

#[tokio::test]
async fn test_permission_queries_are_staff_only() {
    let (app, _db) = create_test_app().await;
    let member = register(&app, "bob@example.com", "Secret123", "Bob").await;

    let response = get(
        &app,
        &format!("/api/roles/users/{}/permissions", member.user_id),
        Some(&member.cookie()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
