//! Secondary store access
//!
//! The secondary store is reached through sqlx's `Any` driver so the same
//! code serves Postgres and SQLite replicas. Every write is an idempotent
//! upsert keyed on the primary store's identifiers.

use std::time::Duration;

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tokio::sync::OnceCell;

use super::mutation::Mutation;
use crate::config::ReplicaConfig;
use crate::error::AppError;

/// Portable DDL for the secondary schema.
///
/// Mirrors the primary tables and columns. Foreign keys are left out
/// because replica writes may land in any order.
pub const SECONDARY_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id BIGINT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        confirmed BIGINT NOT NULL DEFAULT 0,
        name TEXT,
        headline TEXT,
        location TEXT,
        about_me TEXT,
        member_since TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        last_message_read_time TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS posts (
        id BIGINT PRIMARY KEY,
        body TEXT NOT NULL,
        body_html TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        author_id BIGINT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS follows (
        follower_id BIGINT NOT NULL,
        followed_id BIGINT NOT NULL,
        timestamp TEXT NOT NULL,
        PRIMARY KEY (follower_id, followed_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS comments (
        id BIGINT PRIMARY KEY,
        body TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        author_id BIGINT NOT NULL,
        post_id BIGINT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS likes (
        id BIGINT PRIMARY KEY,
        author_id BIGINT NOT NULL,
        post_id BIGINT NOT NULL,
        UNIQUE (author_id, post_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS messages (
        id BIGINT PRIMARY KEY,
        sender_id BIGINT NOT NULL,
        recipient_id BIGINT NOT NULL,
        body TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS notifications (
        id BIGINT PRIMARY KEY,
        user_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        payload_json TEXT NOT NULL,
        timestamp DOUBLE PRECISION NOT NULL
    )"#,
];

/// Best-effort secondary database
///
/// Connects lazily: building a store never touches the network, and the
/// schema is created on the first write.
pub struct SecondaryStore {
    pool: AnyPool,
    schema_ready: OnceCell<()>,
}

impl SecondaryStore {
    /// Build a lazily-connecting store for `url`
    ///
    /// # Errors
    /// Returns error if the URL cannot be parsed or names an unknown driver
    pub fn connect_lazy(url: &str, config: &ReplicaConfig) -> Result<Self, AppError> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .connect_lazy(url)
            .map_err(|e| AppError::Config(format!("invalid replica.url: {e}")))?;

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }

    /// Create the secondary tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        self.schema_ready
            .get_or_try_init(|| async {
                for statement in SECONDARY_SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                tracing::info!("Secondary schema ready");
                Ok::<(), sqlx::Error>(())
            })
            .await?;

        Ok(())
    }

    /// Re-apply one mutation
    pub async fn apply(&self, mutation: &Mutation) -> Result<(), sqlx::Error> {
        self.ensure_schema().await?;

        match mutation {
            Mutation::UpsertUser(user) => {
                sqlx::query(
                    r#"
                    INSERT INTO users (
                        id, username, email, password_hash, confirmed, name, headline,
                        location, about_me, member_since, last_seen, last_message_read_time
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    ON CONFLICT (id) DO UPDATE SET
                        username = excluded.username,
                        email = excluded.email,
                        password_hash = excluded.password_hash,
                        confirmed = excluded.confirmed,
                        name = excluded.name,
                        headline = excluded.headline,
                        location = excluded.location,
                        about_me = excluded.about_me,
                        member_since = excluded.member_since,
                        last_seen = excluded.last_seen,
                        last_message_read_time = excluded.last_message_read_time
                    "#,
                )
                .bind(user.id)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(i64::from(user.confirmed))
                .bind(&user.name)
                .bind(&user.headline)
                .bind(&user.location)
                .bind(&user.about_me)
                .bind(user.member_since.to_rfc3339())
                .bind(user.last_seen.to_rfc3339())
                .bind(user.last_message_read_time.map(|at| at.to_rfc3339()))
                .execute(&self.pool)
                .await?;
            }
            Mutation::UpsertPost(post) => {
                sqlx::query(
                    r#"
                    INSERT INTO posts (id, body, body_html, timestamp, author_id)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO UPDATE SET
                        body = excluded.body,
                        body_html = excluded.body_html,
                        timestamp = excluded.timestamp,
                        author_id = excluded.author_id
                    "#,
                )
                .bind(post.id)
                .bind(&post.body)
                .bind(&post.body_html)
                .bind(post.timestamp.to_rfc3339())
                .bind(post.author_id)
                .execute(&self.pool)
                .await?;
            }
            Mutation::UpsertComment(comment) => {
                sqlx::query(
                    r#"
                    INSERT INTO comments (id, body, timestamp, author_id, post_id)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO UPDATE SET
                        body = excluded.body,
                        timestamp = excluded.timestamp,
                        author_id = excluded.author_id,
                        post_id = excluded.post_id
                    "#,
                )
                .bind(comment.id)
                .bind(&comment.body)
                .bind(comment.timestamp.to_rfc3339())
                .bind(comment.author_id)
                .bind(comment.post_id)
                .execute(&self.pool)
                .await?;
            }
            Mutation::UpsertLike(like) => {
                sqlx::query(
                    r#"
                    INSERT INTO likes (id, author_id, post_id) VALUES ($1, $2, $3)
                    ON CONFLICT (author_id, post_id) DO NOTHING
                    "#,
                )
                .bind(like.id)
                .bind(like.author_id)
                .bind(like.post_id)
                .execute(&self.pool)
                .await?;
            }
            Mutation::DeleteLike { author_id, post_id } => {
                sqlx::query("DELETE FROM likes WHERE author_id = $1 AND post_id = $2")
                    .bind(*author_id)
                    .bind(*post_id)
                    .execute(&self.pool)
                    .await?;
            }
            Mutation::UpsertFollow(follow) => {
                sqlx::query(
                    r#"
                    INSERT INTO follows (follower_id, followed_id, timestamp) VALUES ($1, $2, $3)
                    ON CONFLICT (follower_id, followed_id) DO NOTHING
                    "#,
                )
                .bind(follow.follower_id)
                .bind(follow.followed_id)
                .bind(follow.timestamp.to_rfc3339())
                .execute(&self.pool)
                .await?;
            }
            Mutation::DeleteFollow {
                follower_id,
                followed_id,
            } => {
                sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
                    .bind(*follower_id)
                    .bind(*followed_id)
                    .execute(&self.pool)
                    .await?;
            }
            Mutation::UpsertMessage(message) => {
                sqlx::query(
                    r#"
                    INSERT INTO messages (id, sender_id, recipient_id, body, timestamp)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO UPDATE SET
                        sender_id = excluded.sender_id,
                        recipient_id = excluded.recipient_id,
                        body = excluded.body,
                        timestamp = excluded.timestamp
                    "#,
                )
                .bind(message.id)
                .bind(message.sender_id)
                .bind(message.recipient_id)
                .bind(&message.body)
                .bind(message.timestamp.to_rfc3339())
                .execute(&self.pool)
                .await?;
            }
            Mutation::ReplaceNotification(notification) => {
                let mut tx = self.pool.begin().await?;

                sqlx::query("DELETE FROM notifications WHERE user_id = $1 AND name = $2 AND id <> $3")
                    .bind(notification.user_id)
                    .bind(&notification.name)
                    .bind(notification.id)
                    .execute(&mut *tx)
                    .await?;

                sqlx::query(
                    r#"
                    INSERT INTO notifications (id, user_id, name, payload_json, timestamp)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO UPDATE SET
                        user_id = excluded.user_id,
                        name = excluded.name,
                        payload_json = excluded.payload_json,
                        timestamp = excluded.timestamp
                    "#,
                )
                .bind(notification.id)
                .bind(notification.user_id)
                .bind(&notification.name)
                .bind(&notification.payload_json)
                .bind(notification.timestamp)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
            }
        }

        Ok(())
    }

    /// Count rows of a replicated table.
    pub async fn count_rows(&self, table: &str) -> Result<i64, sqlx::Error> {
        if !SECONDARY_TABLES.contains(&table) {
            return Err(sqlx::Error::Protocol(format!("unknown table: {table}")));
        }

        self.ensure_schema().await?;
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Replicated tables in foreign-key order.
pub const SECONDARY_TABLES: &[&str] = &[
    "users",
    "posts",
    "follows",
    "comments",
    "likes",
    "messages",
    "notifications",
];
