//! ctrack - a small social network with best-effort dual writes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Auth, posts, users, messages endpoints                   │
//! │  - Liveness and metrics                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Validation and business rules                            │
//! │  - Commit to primary, then dispatch to replica              │
//! └─────────────────────────────────────────────────────────────┘
//!                │                               │
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │ Data Layer (primary)         │ │ Replica Layer (secondary)  │
//! │  - SQLite (sqlx)             │ │  - sqlx Any: Postgres or   │
//! │  - authoritative for reads   │ │    SQLite, write-only      │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Primary store
//! - `replica`: Secondary store and dual-write dispatcher
//! - `snapshot`: Remote-to-local SQLite snapshot conversion
//! - `auth`: Passwords and session tokens
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod replica;
pub mod service;
pub mod snapshot;

use std::sync::Arc;

/// Largest accepted request body
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across all handlers
///
/// Cloned for each request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Primary database connection pool
    pub db: Arc<data::Database>,

    /// Dual-write dispatcher for the secondary store
    pub replica: replica::DualWriteDispatcher,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to the primary SQLite database (migrations applied)
    /// 2. Build the replica dispatcher; the secondary is not contacted
    ///
    /// # Errors
    /// Returns error if the primary store cannot be opened or the replica
    /// URL is malformed
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        let replica = replica::DualWriteDispatcher::from_config(&config.replica)?;

        tracing::info!(
            replication = replica.is_enabled(),
            "Application state initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            replica,
        })
    }

    pub fn account_service(&self) -> service::AccountService {
        service::AccountService::new(self.db.clone(), self.replica.clone())
    }

    pub fn post_service(&self) -> service::PostService {
        service::PostService::new(
            self.db.clone(),
            self.replica.clone(),
            self.config.app.posts_per_page,
            self.config.app.recent_posts,
        )
    }

    pub fn message_service(&self) -> service::MessageService {
        service::MessageService::new(
            self.db.clone(),
            self.replica.clone(),
            self.config.app.posts_per_page,
        )
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    Router::new()
        .merge(api::auth_router())
        .merge(api::posts_router())
        .merge(api::users_router())
        .merge(api::messages_router())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::status_router())
        .merge(api::metrics_router())
}
