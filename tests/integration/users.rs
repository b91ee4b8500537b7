//! User CRUD integration tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{bearer, constants, TestApp};

#[tokio::test]
async fn test_create_and_get_user() {
    let app = TestApp::new();
    let (_, token) = app.register("admin@x.com", Some("admin")).await;

    let created = bearer(app.server.post("/api/v1/users"), &token)
        .json(&json!({
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": "grace@x.com",
            "password": constants::TEST_PASSWORD,
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let created: Value = created.json();

    let id = created["id"].as_i64().unwrap();
    let fetched = bearer(app.server.get(&format!("/api/v1/users/{id}")), &token).await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>(), created);
}

#[tokio::test]
async fn test_get_missing_user_is_404() {
    let app = TestApp::new();
    let (_, token) = app.register("a@x.com", None).await;

    let response = bearer(app.server.get("/api/v1/users/999"), &token).await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<Value>()["error"]["message"],
        "User not found"
    );
}

#[tokio::test]
async fn test_update_user_changes_email() {
    let app = TestApp::new();
    let (id, token) = app.register("a@x.com", None).await;

    let response = bearer(app.server.put(&format!("/api/v1/users/{id}")), &token)
        .json(&json!({"email": "B@x.com", "first_name": "Bea"}))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["email"], "b@x.com");
    assert_eq!(json["first_name"], "Bea");
    assert_eq!(json["last_name"], "User");
}

#[tokio::test]
async fn test_empty_update_is_rejected() {
    let app = TestApp::new();
    let (id, token) = app.register("a@x.com", None).await;

    bearer(app.server.put(&format!("/api/v1/users/{id}")), &token)
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_to_taken_email_conflicts() {
    let app = TestApp::new();
    app.register("a@x.com", None).await;
    let (id, token) = app.register("b@x.com", None).await;

    bearer(app.server.put(&format!("/api/v1/users/{id}")), &token)
        .json(&json!({"email": "a@x.com"}))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_requires_admin() {
    let app = TestApp::new();
    let (id, token) = app.register("a@x.com", None).await;

    let response = bearer(app.server.delete(&format!("/api/v1/users/{id}")), &token).await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_admin_deletes_user() {
    let app = TestApp::new();
    let (_, admin) = app.register("admin@x.com", Some("admin")).await;
    let (id, _) = app.register("a@x.com", None).await;

    bearer(app.server.delete(&format!("/api/v1/users/{id}")), &admin)
        .await
        .assert_status_ok();
    bearer(app.server.get(&format!("/api/v1/users/{id}")), &admin)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    bearer(app.server.delete(&format!("/api/v1/users/{id}")), &admin)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_users_paginates() {
    let app = TestApp::new();
    let (_, token) = app.register("u0@x.com", None).await;
    for i in 1..5 {
        app.register(&format!("u{i}@x.com"), None).await;
    }

    let response = bearer(
        app.server
            .get("/api/v1/users")
            .add_query_param("page", 2)
            .add_query_param("page_size", 2),
        &token,
    )
    .await;
    response.assert_status_ok();
    let json: Value = response.json();

    assert_eq!(json["total"], 5);
    assert_eq!(json["page"], 2);
    assert_eq!(json["page_size"], 2);
    assert_eq!(json["total_pages"], 3);
    let emails: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, vec!["u2@x.com", "u3@x.com"]);
    assert!(json["data"][0].get("password_hash").is_none());
}

#[tokio::test]
async fn test_list_users_defaults_and_caps() {
    let app = TestApp::new();
    let (_, token) = app.register("a@x.com", None).await;

    let defaults: Value = bearer(app.server.get("/api/v1/users"), &token).await.json();
    assert_eq!(defaults["page"], 1);
    assert_eq!(defaults["page_size"], 10);

    let capped: Value = bearer(
        app.server.get("/api/v1/users").add_query_param("page_size", 500),
        &token,
    )
    .await
    .json();
    assert_eq!(capped["page_size"], 100);

    bearer(app.server.get("/api/v1/users").add_query_param("page", 0), &token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
