//! Common test utilities for E2E tests

#![allow(dead_code)]

use ctrack::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TEST_PASSWORD: &str = "correct horse";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

pub fn test_config(db_path: std::path::PathBuf, replica_url: Option<String>) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
        },
        database: config::DatabaseConfig { path: db_path },
        replica: config::ReplicaConfig {
            url: replica_url,
            timeout_seconds: 2,
            retry_attempts: 0,
            ..config::ReplicaConfig::default()
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 604800,
        },
        app: config::FeedConfig {
            posts_per_page: 3,
            recent_posts: 3,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Server without a secondary store
    pub async fn new() -> Self {
        Self::with_replica(None).await
    }

    /// Server replicating to `replica_url`, if given
    pub async fn with_replica(replica_url: Option<String>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = test_config(db_path, replica_url);

        let state = AppState::new(config).await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = ctrack::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Directory that lives as long as the server; handy for replica files
    pub fn temp_path(&self) -> &std::path::Path {
        self._temp_dir.path()
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Register `username` with [`TEST_PASSWORD`]; returns the response body.
    pub async fn register(&self, username: &str) -> Value {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": TEST_PASSWORD,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201, "register {username}");
        response.json().await.unwrap()
    }

    /// Log in and return the session token.
    pub async fn login(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "login": username, "password": TEST_PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "login {username}");
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn register_and_login(&self, username: &str) -> String {
        self.register(username).await;
        self.login(username).await
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Create a post and return its id.
    pub async fn create_post(&self, token: &str, body: &str) -> i64 {
        let response = self.post(token, "/index", json!({ "body": body })).await;
        assert_eq!(response.status(), 201);
        let post: Value = response.json().await.unwrap();
        post["id"].as_i64().unwrap()
    }
}
