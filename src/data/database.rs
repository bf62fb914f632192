//! SQLite database operations
//!
//! All primary-store access goes through this module.
//! The primary store is authoritative for every read the application makes.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqliteConnection, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

const POST_COLUMNS: &str = "p.id, p.body, p.body_html, p.timestamp, p.author_id, u.username AS author_username, \
     (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count";

fn map_unique_violation(error: sqlx::Error, message: &str) -> AppError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(error),
    }
}

fn page_offset(page: u32, per_page: usize) -> i64 {
    (page.max(1) as i64 - 1) * per_page as i64
}

/// Trim the look-ahead row used to detect a following page.
fn into_page<T>(mut rows: Vec<T>, page: u32, per_page: usize) -> Page<T> {
    let has_next = rows.len() > per_page;
    rows.truncate(per_page);
    Page {
        items: rows,
        page: page.max(1),
        has_next,
    }
}

/// Primary database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
            }
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Underlying pool, for bulk copy jobs.
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    ///
    /// # Errors
    /// `Conflict` when the username or email is taken
    pub async fn insert_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, confirmed, member_since, last_seen)
            VALUES (?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Username or email is already registered."))?;

        self.get_user(result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Get user by ID
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get user by exact username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get user by username or email, whichever matches
    pub async fn get_user_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = ? OR email = ? ORDER BY id LIMIT 1",
        )
        .bind(login)
        .bind(normalize_email(login))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update editable profile fields
    ///
    /// # Errors
    /// `Conflict` when the new username is taken, `NotFound` for unknown users
    pub async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<User, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?, about_me = ?, name = ?, headline = ?, location = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.username)
        .bind(&update.about_me)
        .bind(&update.name)
        .bind(&update.headline)
        .bind(&update.location)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Please use a different username."))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        self.get_user(id).await?.ok_or(AppError::NotFound)
    }

    /// Replace a user's password hash
    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<User, AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        self.get_user(id).await?.ok_or(AppError::NotFound)
    }

    /// Mark a user as confirmed
    pub async fn confirm_user(&self, id: i64) -> Result<User, AppError> {
        let result = sqlx::query("UPDATE users SET confirmed = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        self.get_user(id).await?.ok_or(AppError::NotFound)
    }

    /// Record activity for a user
    pub async fn touch_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Set the point before which received messages count as read
    pub async fn mark_messages_read(&self, id: i64, at: DateTime<Utc>) -> Result<User, AppError> {
        sqlx::query("UPDATE users SET last_message_read_time = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.get_user(id).await?.ok_or(AppError::NotFound)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a post
    pub async fn insert_post(
        &self,
        author_id: i64,
        body: &str,
        body_html: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Post, AppError> {
        let result = sqlx::query(
            "INSERT INTO posts (body, body_html, timestamp, author_id) VALUES (?, ?, ?, ?)",
        )
        .bind(body)
        .bind(body_html)
        .bind(timestamp)
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        Ok(Post {
            id: result.last_insert_rowid(),
            body: body.to_string(),
            body_html: body_html.to_string(),
            timestamp,
            author_id,
        })
    }

    /// Get post by ID with its author
    pub async fn get_post(&self, id: i64) -> Result<Option<PostWithAuthor>, AppError> {
        let post = sqlx::query_as::<_, PostWithAuthor>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id WHERE p.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    /// Most recent posts of one author
    pub async fn recent_posts_by_author(
        &self,
        author_id: i64,
        limit: usize,
    ) -> Result<Vec<PostWithAuthor>, AppError> {
        let posts = sqlx::query_as::<_, PostWithAuthor>(&format!(
            r#"
            SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
            WHERE p.author_id = ?
            ORDER BY p.timestamp DESC, p.id DESC
            LIMIT ?
            "#
        ))
        .bind(author_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// All posts, newest first
    pub async fn posts_page(
        &self,
        page: u32,
        per_page: usize,
    ) -> Result<Page<PostWithAuthor>, AppError> {
        let posts = sqlx::query_as::<_, PostWithAuthor>(&format!(
            r#"
            SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
            ORDER BY p.timestamp DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(per_page as i64 + 1)
        .bind(page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(into_page(posts, page, per_page))
    }

    /// One author's posts, newest first
    pub async fn posts_by_author_page(
        &self,
        author_id: i64,
        page: u32,
        per_page: usize,
    ) -> Result<Page<PostWithAuthor>, AppError> {
        let posts = sqlx::query_as::<_, PostWithAuthor>(&format!(
            r#"
            SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
            WHERE p.author_id = ?
            ORDER BY p.timestamp DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(author_id)
        .bind(per_page as i64 + 1)
        .bind(page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(into_page(posts, page, per_page))
    }

    /// Count posts by one author
    pub async fn count_posts_by_author(&self, author_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE author_id = ?")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Insert a comment
    pub async fn insert_comment(
        &self,
        post_id: i64,
        author_id: i64,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Comment, AppError> {
        let result = sqlx::query(
            "INSERT INTO comments (body, timestamp, author_id, post_id) VALUES (?, ?, ?, ?)",
        )
        .bind(body)
        .bind(timestamp)
        .bind(author_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            body: body.to_string(),
            timestamp,
            author_id,
            post_id,
        })
    }

    /// Comments on a post, oldest first
    pub async fn comments_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, AppError> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.id, c.body, c.timestamp, c.author_id, u.username AS author_username, c.post_id
            FROM comments c JOIN users u ON u.id = c.author_id
            WHERE c.post_id = ?
            ORDER BY c.timestamp ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    // =========================================================================
    // Likes
    // =========================================================================

    /// Like the post, or remove the like if it already exists
    pub async fn toggle_like(&self, author_id: i64, post_id: i64) -> Result<LikeToggle, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE author_id = ? AND post_id = ?")
            .bind(author_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        let toggle = if removed.rows_affected() > 0 {
            LikeToggle::Unliked { author_id, post_id }
        } else {
            let inserted = sqlx::query("INSERT INTO likes (author_id, post_id) VALUES (?, ?)")
                .bind(author_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            LikeToggle::Liked(Like {
                id: inserted.last_insert_rowid(),
                author_id,
                post_id,
            })
        };

        tx.commit().await?;
        Ok(toggle)
    }

    /// Count likes on a post
    pub async fn count_likes(&self, post_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Check if a user liked a post
    pub async fn is_liked(&self, author_id: i64, post_id: i64) -> Result<bool, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE author_id = ? AND post_id = ?")
                .bind(author_id)
                .bind(post_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    // =========================================================================
    // Follow relationships
    // =========================================================================

    /// Insert a follow relationship
    ///
    /// # Returns
    /// The new relationship, or `None` when it already existed
    pub async fn follow(
        &self,
        follower_id: i64,
        followed_id: i64,
    ) -> Result<Option<Follow>, AppError> {
        let timestamp = Utc::now();
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO follows (follower_id, followed_id, timestamp) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok((inserted.rows_affected() > 0).then_some(Follow {
            follower_id,
            followed_id,
            timestamp,
        }))
    }

    /// Delete a follow relationship
    ///
    /// # Returns
    /// `true` when a relationship was removed
    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check if `follower_id` follows `followed_id`
    pub async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followed_id = ?",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Count followers of a user.
    pub async fn count_followers(&self, user_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE followed_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Count users followed by a user.
    pub async fn count_following(&self, user_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE follower_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Insert a direct message and refresh the recipient's unread counter
    ///
    /// The message and the `unread_message_count` notification commit in
    /// one transaction.
    pub async fn send_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(Message, Notification), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO messages (sender_id, recipient_id, body, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(body)
        .bind(timestamp)
        .execute(&mut *tx)
        .await?;

        let message = Message {
            id: result.last_insert_rowid(),
            sender_id,
            recipient_id,
            body: body.to_string(),
            timestamp,
        };

        let unread = count_unread(&mut tx, recipient_id).await?;
        let notification = replace_notification_in(
            &mut tx,
            recipient_id,
            NotificationName::UnreadMessageCount.as_str(),
            &serde_json::json!(unread),
            epoch_seconds(timestamp),
        )
        .await?;

        tx.commit().await?;
        Ok((message, notification))
    }

    /// Messages received by a user, newest first
    pub async fn messages_received_page(
        &self,
        recipient_id: i64,
        page: u32,
        per_page: usize,
    ) -> Result<Page<MessageWithSender>, AppError> {
        let messages = sqlx::query_as::<_, MessageWithSender>(
            r#"
            SELECT m.id, m.sender_id, u.username AS sender_username, m.recipient_id, m.body, m.timestamp
            FROM messages m JOIN users u ON u.id = m.sender_id
            WHERE m.recipient_id = ?
            ORDER BY m.timestamp DESC, m.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(recipient_id)
        .bind(per_page as i64 + 1)
        .bind(page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(into_page(messages, page, per_page))
    }

    /// Count messages received after the user last opened their inbox
    pub async fn unread_message_count(&self, user_id: i64) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        count_unread(&mut conn, user_id).await
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Replace the user's notification of this name
    ///
    /// Deletes any existing notification with the same name and inserts
    /// the new one in a single transaction.
    pub async fn replace_notification(
        &self,
        user_id: i64,
        name: &str,
        payload: &serde_json::Value,
        timestamp: f64,
    ) -> Result<Notification, AppError> {
        let mut tx = self.pool.begin().await?;
        let notification = replace_notification_in(&mut tx, user_id, name, payload, timestamp).await?;
        tx.commit().await?;
        Ok(notification)
    }

    /// Notifications newer than `since`, oldest first
    pub async fn notifications_since(
        &self,
        user_id: i64,
        since: f64,
    ) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ? AND timestamp > ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }
}

async fn count_unread(conn: &mut SqliteConnection, user_id: i64) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM messages m JOIN users u ON u.id = m.recipient_id
        WHERE m.recipient_id = ?
          AND (u.last_message_read_time IS NULL OR m.timestamp > u.last_message_read_time)
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Delete-then-insert on an open transaction so one name keeps one row.
async fn replace_notification_in(
    conn: &mut SqliteConnection,
    user_id: i64,
    name: &str,
    payload: &serde_json::Value,
    timestamp: f64,
) -> Result<Notification, AppError> {
    let payload_json = serde_json::to_string(payload).map_err(|e| AppError::Internal(e.into()))?;

    sqlx::query("DELETE FROM notifications WHERE user_id = ? AND name = ?")
        .bind(user_id)
        .bind(name)
        .execute(&mut *conn)
        .await?;

    let inserted = sqlx::query(
        "INSERT INTO notifications (user_id, name, payload_json, timestamp) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(&payload_json)
    .bind(timestamp)
    .execute(&mut *conn)
    .await?;

    Ok(Notification {
        id: inserted.last_insert_rowid(),
        user_id,
        name: name.to_string(),
        payload_json,
        timestamp,
    })
}
