//! E2E tests for registration, login, profiles and follows

mod common;

use common::{TEST_PASSWORD, TestServer};
use serde_json::{Value, json};

#[tokio::test]
async fn test_register_hides_password_hash() {
    let server = TestServer::new().await;

    let user = server.register("alice").await;

    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["confirmed"], false);
    assert!(user.get("password_hash").is_none());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let server = TestServer::new().await;
    server.register("alice").await;

    let response = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_login_with_email_and_wrong_password() {
    let server = TestServer::new().await;
    server.register("alice").await;

    let ok = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "ALICE@example.com", "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);
    assert!(ok.headers().get("set-cookie").is_some());

    let wrong = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "login": "alice", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);
}

#[tokio::test]
async fn test_confirm_and_reset_password() {
    let server = TestServer::new().await;
    let token = server.register_and_login("alice").await;

    let confirmed: Value = server
        .post(&token, "/auth/confirm", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(confirmed["confirmed"], true);

    let reset = server
        .post(&token, "/auth/reset_password", json!({ "password": "new-pass" }))
        .await;
    assert_eq!(reset.status(), 200);

    let login = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "login": "alice", "password": "new-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);
}

#[tokio::test]
async fn test_edit_profile_and_rename_conflict() {
    let server = TestServer::new().await;
    let token = server.register_and_login("alice").await;
    server.register("bob").await;

    let response = server
        .post(
            &token,
            "/edit_profile",
            json!({ "username": "alice", "about_me": "hello there", "location": "Tokyo" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let profile: Value = server.get(&token, "/edit_profile").await.json().await.unwrap();
    assert_eq!(profile["about_me"], "hello there");
    assert_eq!(profile["location"], "Tokyo");

    let taken = server
        .post(&token, "/edit_profile", json!({ "username": "bob" }))
        .await;
    assert_eq!(taken.status(), 409);

    let long = server
        .post(
            &token,
            "/edit_profile",
            json!({ "username": "alice", "about_me": "x".repeat(141) }),
        )
        .await;
    assert_eq!(long.status(), 400);
}

#[tokio::test]
async fn test_follow_flow_and_self_follow_rejected() {
    let server = TestServer::new().await;
    let alice = server.register_and_login("alice").await;
    server.register("bob").await;

    let self_follow = server.post(&alice, "/follow/alice", json!({})).await;
    assert_eq!(self_follow.status(), 400);
    let body: Value = self_follow.json().await.unwrap();
    assert_eq!(body["error"], "You cannot follow yourself!");

    let unknown = server.post(&alice, "/follow/carol", json!({})).await;
    assert_eq!(unknown.status(), 404);

    assert_eq!(server.post(&alice, "/follow/bob", json!({})).await.status(), 200);

    let popup: Value = server.get(&alice, "/user/bob/popup").await.json().await.unwrap();
    assert_eq!(popup["followers"], 1);
    assert_eq!(popup["is_following"], true);
    assert!(popup["user"].get("email").is_none());

    assert_eq!(server.post(&alice, "/unfollow/bob", json!({})).await.status(), 200);
    let popup: Value = server.get(&alice, "/user/bob/popup").await.json().await.unwrap();
    assert_eq!(popup["followers"], 0);
    assert_eq!(popup["is_following"], false);
}

#[tokio::test]
async fn test_profile_paginates_posts() {
    let server = TestServer::new().await;
    let token = server.register_and_login("alice").await;
    for i in 0..4 {
        server.create_post(&token, &format!("post {i}")).await;
    }

    let first: Value = server.get(&token, "/user/alice").await.json().await.unwrap();
    assert_eq!(first["posts"]["items"].as_array().unwrap().len(), 3);
    assert_eq!(first["posts"]["next_url"], "/user/alice?page=2");
    assert!(first["posts"]["prev_url"].is_null());
    assert_eq!(first["user"]["email"], "alice@example.com");

    let second: Value = server
        .get(&token, "/user/alice?page=2")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["posts"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(second["posts"]["items"][0]["body"], "post 0");

    assert_eq!(server.get(&token, "/user/nobody").await.status(), 404);
}

#[tokio::test]
async fn test_last_seen_advances_on_requests() {
    let server = TestServer::new().await;
    let registered = server.register("alice").await;
    let token = server.login("alice").await;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let profile: Value = server.get(&token, "/edit_profile").await.json().await.unwrap();

    let before: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(registered["last_seen"].clone()).unwrap();
    let after: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(profile["last_seen"].clone()).unwrap();
    assert!(after > before);
}

#[tokio::test]
async fn test_non_ascii_email_login() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({
            "username": "elodie",
            "email": "ÉLODIE@example.com",
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let login = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "ÉLODIE@example.com", "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);
    let body: Value = login.json().await.unwrap();
    assert_eq!(body["user"]["email"], "élodie@example.com");
}
