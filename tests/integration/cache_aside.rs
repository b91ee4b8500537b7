//! Cache-aside consistency tests
//!
//! These check the user cache through the service and the HTTP layer: warm
//! reads skip the repository, writes replace both keys, and a
//! broken backend never fails a request.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use roster::users::{CreateUserInput, UpdateUserInput};
use roster::NullStore;
use serde_json::{json, Value};

use crate::common::{bearer, constants, test_config, TestApp};
use crate::mocks::FlakyStore;

fn input(email: &str) -> CreateUserInput {
    CreateUserInput {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: email.into(),
        password: constants::TEST_PASSWORD.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_warm_reads_skip_the_repository() {
    let app = TestApp::new();
    let (id, token) = app.register("a@x.com", None).await;
    let before = app.repo.lookups();

    for _ in 0..5 {
        bearer(app.server.get(&format!("/api/v1/users/{id}")), &token)
            .await
            .assert_status_ok();
    }

    assert_eq!(app.repo.lookups(), before);
}

#[tokio::test]
async fn test_id_read_warms_email_key() {
    let app = TestApp::new();
    let users = &app.state.users;
    let user = users.create_user(input("a@x.com")).await.unwrap();
    users.cache().invalidate(user.id, &user.email).await.unwrap();

    users.get_user_by_id(user.id).await.unwrap();
    let lookups = app.repo.lookups();

    // Served by the key the id lookup populated
    assert_eq!(users.get_user_by_email("A@X.com").await.unwrap(), user);
    assert_eq!(app.repo.lookups(), lookups);
}

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let app = TestApp::new();
    let users = &app.state.users;
    let cache = users.cache();

    let created = users.create_user(input("a@x.com")).await.unwrap();
    assert_eq!(created.id, 1);
    let hit = cache.get_by_id(1).await.unwrap().unwrap();
    assert_eq!((hit.id, hit.email.as_str()), (1, "a@x.com"));

    let updated = users
        .update_user(
            1,
            UpdateUserInput {
                email: Some("b@x.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cache.get_by_email("a@x.com").await.unwrap(), None);
    assert_eq!(cache.get_by_email("b@x.com").await.unwrap(), Some(updated));

    users.delete_user(1).await.unwrap();
    assert_eq!(cache.get_by_id(1).await.unwrap(), None);
    assert_eq!(cache.get_by_email("b@x.com").await.unwrap(), None);
}

#[tokio::test]
async fn test_login_after_email_change_uses_new_email() {
    let app = TestApp::new();
    let (id, token) = app.register("a@x.com", None).await;

    bearer(app.server.put(&format!("/api/v1/users/{id}")), &token)
        .json(&json!({"email": "b@x.com"}))
        .await
        .assert_status_ok();

    let old = app
        .server
        .post("/api/v1/login")
        .json(&json!({"email": "a@x.com", "password": constants::TEST_PASSWORD}))
        .await;
    old.assert_status(axum::http::StatusCode::UNAUTHORIZED);

    let new = app
        .server
        .post("/api/v1/login")
        .json(&json!({"email": "b@x.com", "password": constants::TEST_PASSWORD}))
        .await;
    new.assert_status_ok();
    assert_eq!(new.json::<Value>()["user"]["id"], id);
}

#[tokio::test]
async fn test_cache_outage_is_invisible_to_clients() {
    let store = Arc::new(FlakyStore::new());
    let app = TestApp::with(test_config(), store.clone());
    let (id, token) = app.register("a@x.com", None).await;

    store.set_failing(true);

    let fetched = bearer(app.server.get(&format!("/api/v1/users/{id}")), &token).await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>()["email"], "a@x.com");

    bearer(app.server.put(&format!("/api/v1/users/{id}")), &token)
        .json(&json!({"first_name": "Grace"}))
        .await
        .assert_status_ok();

    let login = app
        .server
        .post("/api/v1/login")
        .json(&json!({"email": "a@x.com", "password": constants::TEST_PASSWORD}))
        .await;
    login.assert_status_ok();
    assert_eq!(login.json::<Value>()["user"]["first_name"], "Grace");
}

#[tokio::test]
async fn test_outage_write_leaves_snapshot_until_invalidated() {
    let store = Arc::new(FlakyStore::new());
    let app = TestApp::with(test_config(), store.clone());
    let users = &app.state.users;
    let user = users.create_user(input("a@x.com")).await.unwrap();

    // The database takes the update while the cache is down
    store.set_failing(true);
    users
        .update_user(
            user.id,
            UpdateUserInput {
                first_name: Some("Grace".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store.set_failing(false);

    // The old snapshot lives until its TTL or an invalidation
    let stale = users.cache().get_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stale.first_name, "Ada");

    users.cache().invalidate(user.id, &user.email).await.unwrap();
    assert_eq!(
        users.get_user_by_id(user.id).await.unwrap().first_name,
        "Grace"
    );
}

#[tokio::test]
async fn test_null_backend_serves_everything_from_the_repository() {
    let app = TestApp::with(test_config(), Arc::new(NullStore::new()));
    let (id, token) = app.register("a@x.com", None).await;

    for _ in 0..3 {
        bearer(app.server.get(&format!("/api/v1/users/{id}")), &token)
            .await
            .assert_status_ok();
    }

    assert_eq!(app.state.users.cache().get_by_id(id).await.unwrap(), None);
    assert!(app.repo.lookups() >= 3);
}
