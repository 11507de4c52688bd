//! Uses the single integration test approach.
//!
//! This improves parallelism when running the tests, and reduces the number of binaries that have to be built (and linked)

mod common;
mod websocket;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

use common::{
    ADMIN, KillOnDrop, get_free_port, spawn_coordinator_with_config, start_coordinator,
    test_config, wait_for_listening,
};

fn api(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}/api{path}")
}

#[tokio::test]
async fn coordinator_config_loads() {
    let port = get_free_port();
    let child = spawn_coordinator_with_config(port, &test_config(port));
    let mut drop_guard = KillOnDrop(child);
    wait_for_listening(port, 5).await;
    drop(drop_guard.0.kill());
    let status = drop_guard.0.wait().expect("failed to wait on child");
    #[cfg(unix)]
    assert!(
        status.success() || status.code() == Some(0) || status.signal() == Some(9),
        "Process did not start or exit as expected"
    );
    #[cfg(not(unix))]
    assert!(
        status.success() || status.code() == Some(0),
        "Process did not start or exit as expected"
    );
}

#[tokio::test]
async fn coordinator_rejects_config_without_platform() {
    let port = get_free_port();
    let config = test_config(port).replace("[platform]", "[unused]");
    let mut child = KillOnDrop(spawn_coordinator_with_config(port, &config));
    let status = child.0.wait().expect("failed to wait on child");
    assert!(!status.success(), "coordinator started with an invalid config");
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let (_guard, port) = start_coordinator().await;

    let resp = Client::new()
        .get(api(port, "/applications"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "authentication required");
}

#[tokio::test]
async fn submitted_application_is_listed_for_its_owner_only() {
    let (_guard, port) = start_coordinator().await;
    let client = Client::new();

    let resp = client
        .post(api(port, "/applications"))
        .header("x-forwarded-user", "alice")
        .header("x-forwarded-email", "alice@example.com")
        .json(&json!({
            "name": "blog",
            "git_url": "https://github.com/alice/blog.git",
            "branch": "main",
            "port": 8080,
            "description": "personal blog",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["primary_hostname"], "blog.apps.example.com");

    let own: Value = client
        .get(api(port, "/applications"))
        .header("x-forwarded-user", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(own.as_array().map(Vec::len), Some(1));

    let others: Value = client
        .get(api(port, "/applications"))
        .header("x-forwarded-user", "bob")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(others, json!([]));

    let resp = client
        .get(api(port, &format!("/applications/{}", created["id"])))
        .header("x-forwarded-user", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_submissions_are_bad_requests() {
    let (_guard, port) = start_coordinator().await;

    let resp = Client::new()
        .post(api(port, "/applications"))
        .header("x-forwarded-user", "alice")
        .json(&json!({
            "name": "Blog_App",
            "git_url": "https://github.com/alice/blog.git",
            "branch": "main",
            "port": 8080,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_names_conflict() {
    let (_guard, port) = start_coordinator().await;
    let client = Client::new();
    let submission = json!({
        "name": "shop",
        "git_url": "https://github.com/alice/shop.git",
        "branch": "main",
        "port": 3000,
    });

    for (user, expected) in [("alice", StatusCode::CREATED), ("bob", StatusCode::CONFLICT)] {
        let resp = client
            .post(api(port, "/applications"))
            .header("x-forwarded-user", user)
            .json(&submission)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), expected, "submission by {user}");
    }
}

#[tokio::test]
async fn admin_routes_require_the_admin_flag() {
    let (_guard, port) = start_coordinator().await;
    let client = Client::new();

    let resp = client
        .get(api(port, "/admin/applications"))
        .header("x-forwarded-user", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .get(api(port, "/admin/users"))
        .header("x-forwarded-user", ADMIN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let users: Value = resp.json().await.unwrap();
    assert!(
        users
            .as_array()
            .unwrap()
            .iter()
            .any(|user| user["username"] == ADMIN && user["is_admin"] == true),
        "admin missing from {users}"
    );

    let resp = client
        .get(api(port, "/admin/users/9999"))
        .header("x-forwarded-user", ADMIN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .get(api(port, "/admin/users/9999/applications"))
        .header("x-forwarded-user", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approval_fails_at_first_unreachable_backend() {
    let (_guard, port) = start_coordinator().await;
    let client = Client::new();

    let created: Value = client
        .post(api(port, "/applications"))
        .header("x-forwarded-user", "alice")
        .json(&json!({
            "name": "wiki",
            "git_url": "https://github.com/alice/wiki.git",
            "branch": "main",
            "port": 8080,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = &created["id"];

    let resp = client
        .post(api(port, &format!("/admin/applications/{id}/approve")))
        .header("x-forwarded-user", ADMIN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let journal: Value = client
        .get(api(port, &format!("/admin/applications/{id}/journal")))
        .header("x-forwarded-user", ADMIN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let failed = journal
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["outcome"] == "failed")
        .expect("no failed journal entry");
    assert_eq!(failed["stage"], "init_secret");

    let application: Value = client
        .get(api(port, &format!("/applications/{id}")))
        .header("x-forwarded-user", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(application["status"], "pending");
}

#[tokio::test]
async fn notifications_of_other_users_are_not_found() {
    let (_guard, port) = start_coordinator().await;
    let client = Client::new();

    // Registering alice stores a notification for the admin.
    let resp = client
        .get(api(port, "/notifications"))
        .header("x-forwarded-user", ADMIN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    drop(
        client
            .get(api(port, "/notifications"))
            .header("x-forwarded-user", "alice")
            .send()
            .await
            .unwrap(),
    );

    let admin_notifications: Value = client
        .get(api(port, "/notifications"))
        .header("x-forwarded-user", ADMIN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let registered = admin_notifications
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["message"] == "New user registered: alice")
        .expect("admin was not notified about alice");

    let resp = client
        .delete(api(port, &format!("/notifications/{}", registered["id"])))
        .header("x-forwarded-user", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(api(port, &format!("/notifications/{}/read", registered["id"])))
        .header("x-forwarded-user", ADMIN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let deleted: Value = client
        .delete(api(port, "/notifications/read"))
        .header("x-forwarded-user", ADMIN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], 1);
}
