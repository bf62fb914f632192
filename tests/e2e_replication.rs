//! E2E tests for dual writes to the secondary store

mod common;

use common::TestServer;
use serde_json::{Value, json};

fn sqlite_replica_url(server_dir: &std::path::Path) -> String {
    format!("sqlite://{}/replica.db?mode=rwc", server_dir.display())
}

#[tokio::test]
async fn test_without_replica_nothing_is_dispatched() {
    let server = TestServer::new().await;
    let token = server.register_and_login("alice").await;
    server.create_post(&token, "primary only").await;

    assert!(!server.state.replica.is_enabled());
    assert!(server.state.replica.store().is_none());
    assert_eq!(server.state.replica.in_flight(), 0);
}

#[tokio::test]
async fn test_unreachable_replica_does_not_fail_requests() {
    let replica_dir = tempfile::TempDir::new().unwrap();
    // Missing directory and no `mode=rwc`: every secondary write fails.
    let url = format!(
        "sqlite://{}/missing/replica.db",
        replica_dir.path().display()
    );
    let server = TestServer::with_replica(Some(url)).await;
    assert!(server.state.replica.is_enabled());

    let alice = server.register_and_login("alice").await;
    server.register("bob").await;
    let post_id = server.create_post(&alice, "still works").await;

    let comment = server
        .post(&alice, &format!("/post/{post_id}"), json!({ "body": "me too" }))
        .await;
    assert_eq!(comment.status(), 201);

    let message = server
        .post(&alice, "/send_message/bob", json!({ "body": "hi" }))
        .await;
    assert_eq!(message.status(), 201);

    assert_eq!(server.post(&alice, "/follow/bob", json!({})).await.status(), 200);

    server.state.replica.flush().await;
    assert_eq!(server.state.replica.in_flight(), 0);

    let detail: Value = server
        .get(&alice, &format!("/post/{post_id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["post"]["body"], "still works");
    assert_eq!(detail["comments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sqlite_replica_converges_with_primary() {
    let replica_dir = tempfile::TempDir::new().unwrap();
    let server =
        TestServer::with_replica(Some(sqlite_replica_url(replica_dir.path()))).await;

    let alice = server.register_and_login("alice").await;
    let bob = server.register_and_login("bob").await;

    let post_id = server.create_post(&alice, "replicated").await;
    server.create_post(&bob, "also replicated").await;
    server
        .post(&bob, &format!("/post/{post_id}"), json!({ "body": "nice" }))
        .await;
    server
        .post(&bob, &format!("/post/{post_id}/like"), json!({}))
        .await;
    server.post(&bob, "/follow/alice", json!({})).await;
    server.post(&alice, "/follow/bob", json!({})).await;
    // Replica writes carry no ordering; settle the follow before undoing it.
    server.state.replica.flush().await;
    server.post(&alice, "/unfollow/bob", json!({})).await;
    for body in ["one", "two"] {
        server
            .post(&alice, "/send_message/bob", json!({ "body": body }))
            .await;
    }

    server.state.replica.flush().await;

    let store = server.state.replica.store().unwrap();
    let expected = [
        ("users", 2),
        ("posts", 2),
        ("comments", 1),
        ("likes", 1),
        ("follows", 1),
        ("messages", 2),
        ("notifications", 1),
    ];
    for (table, rows) in expected {
        assert_eq!(store.count_rows(table).await.unwrap(), rows, "{table}");
    }

    // Unliking removes the replica row as well.
    server
        .post(&bob, &format!("/post/{post_id}/like"), json!({}))
        .await;
    server.state.replica.flush().await;
    assert_eq!(store.count_rows("likes").await.unwrap(), 0);
}

#[tokio::test]
async fn test_replica_keeps_one_notification_per_name() {
    let replica_dir = tempfile::TempDir::new().unwrap();
    let server =
        TestServer::with_replica(Some(sqlite_replica_url(replica_dir.path()))).await;

    let alice = server.register_and_login("alice").await;
    let bob = server.register_and_login("bob").await;

    for i in 0..3 {
        server
            .post(&alice, "/send_message/bob", json!({ "body": format!("msg {i}") }))
            .await;
        server.state.replica.flush().await;
    }
    server.get(&bob, "/messages").await;
    server.state.replica.flush().await;

    let store = server.state.replica.store().unwrap();
    assert_eq!(store.count_rows("notifications").await.unwrap(), 1);
    assert_eq!(store.count_rows("messages").await.unwrap(), 3);
}
