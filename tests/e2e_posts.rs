//! E2E tests for posts, comments and likes

mod common;

use common::TestServer;
use serde_json::{Value, json};

#[tokio::test]
async fn test_index_shows_three_recent_own_posts() {
    let server = TestServer::new().await;
    let alice = server.register_and_login("alice").await;
    let bob = server.register_and_login("bob").await;

    for i in 0..4 {
        server.create_post(&alice, &format!("alice {i}")).await;
    }
    server.create_post(&bob, "bob's post").await;

    let posts: Value = server.get(&alice, "/index").await.json().await.unwrap();
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 3);
    assert_eq!(posts[0]["body"], "alice 3");
    assert!(posts.iter().all(|post| post["author_username"] == "alice"));

    let root: Value = server.get(&alice, "/").await.json().await.unwrap();
    assert_eq!(root.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_post_body_is_escaped() {
    let server = TestServer::new().await;
    let token = server.register_and_login("alice").await;

    let response = server
        .post(&token, "/", json!({ "post": "<script>alert(1)</script>" }))
        .await;
    assert_eq!(response.status(), 201);
    let post: Value = response.json().await.unwrap();
    assert_eq!(
        post["body_html"],
        "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>"
    );

    let empty = server.post(&token, "/index", json!({ "body": "  " })).await;
    assert_eq!(empty.status(), 400);
}

#[tokio::test]
async fn test_explore_pagination_links() {
    let server = TestServer::new().await;
    let token = server.register_and_login("alice").await;
    for i in 0..5 {
        server.create_post(&token, &format!("post {i}")).await;
    }

    let first: Value = server.get(&token, "/explore").await.json().await.unwrap();
    assert_eq!(first["page"], 1);
    assert_eq!(first["items"].as_array().unwrap().len(), 3);
    assert_eq!(first["items"][0]["body"], "post 4");
    assert_eq!(first["next_url"], "/explore?page=2");
    assert!(first["prev_url"].is_null());

    let second: Value = server
        .get(&token, "/explore?page=2")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["items"].as_array().unwrap().len(), 2);
    assert!(second["next_url"].is_null());
    assert_eq!(second["prev_url"], "/explore?page=1");
}

#[tokio::test]
async fn test_comments_are_listed_oldest_first() {
    let server = TestServer::new().await;
    let alice = server.register_and_login("alice").await;
    let bob = server.register_and_login("bob").await;
    let post_id = server.create_post(&alice, "hello").await;

    for body in ["first", "second"] {
        let response = server
            .post(&bob, &format!("/post/{post_id}"), json!({ "body": body }))
            .await;
        assert_eq!(response.status(), 201);
    }

    let too_long = server
        .post(&bob, &format!("/post/{post_id}"), json!({ "body": "x".repeat(141) }))
        .await;
    assert_eq!(too_long.status(), 400);

    let detail: Value = server
        .get(&alice, &format!("/post/{post_id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["post"]["body"], "hello");
    let comments = detail["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["body"], "first");
    assert_eq!(comments[1]["author_username"], "bob");
    assert_eq!(detail["post"]["comment_count"], 2);

    let explore: Value = server.get(&bob, "/explore").await.json().await.unwrap();
    assert_eq!(explore["items"][0]["comment_count"], 2);

    assert_eq!(server.get(&alice, "/post/9999").await.status(), 404);
}

#[tokio::test]
async fn test_like_toggles_in_pairs() {
    let server = TestServer::new().await;
    let alice = server.register_and_login("alice").await;
    let bob = server.register_and_login("bob").await;
    let post_id = server.create_post(&alice, "hello").await;
    let like_path = format!("/post/{post_id}/like");

    let liked: Value = server.post(&bob, &like_path, json!({})).await.json().await.unwrap();
    assert_eq!(liked, json!({ "liked": true, "likes": 1 }));

    let other: Value = server.post(&alice, &like_path, json!({})).await.json().await.unwrap();
    assert_eq!(other, json!({ "liked": true, "likes": 2 }));

    let unliked: Value = server.post(&bob, &like_path, json!({})).await.json().await.unwrap();
    assert_eq!(unliked, json!({ "liked": false, "likes": 1 }));

    let detail: Value = server
        .get(&bob, &format!("/post/{post_id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["likes"], 1);
    assert_eq!(detail["liked"], false);

    assert_eq!(
        server.post(&bob, "/post/9999/like", json!({})).await.status(),
        404
    );
}

#[tokio::test]
async fn test_explore_handles_extreme_and_malformed_pages() {
    let server = TestServer::new().await;
    let token = server.register_and_login("alice").await;
    server.create_post(&token, "only post").await;

    let last = server.get(&token, "/explore?page=4294967295").await;
    assert_eq!(last.status(), 200);
    let last: Value = last.json().await.unwrap();
    assert!(last["items"].as_array().unwrap().is_empty());
    assert!(last["next_url"].is_null());
    assert_eq!(last["prev_url"], "/explore?page=4294967294");

    for path in ["/explore?page=abc", "/explore?page=-1", "/explore?page="] {
        let response = server.get(&token, path).await;
        assert_eq!(response.status(), 200, "{path}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["page"], 1, "{path}");
        assert_eq!(body["items"][0]["body"], "only post", "{path}");
    }

    let profile = server.get(&token, "/user/alice?page=4294967295").await;
    assert_eq!(profile.status(), 200);
}
