//! Data models
//!
//! Rust structs representing database entities.
//! IDs are integers assigned by the primary store; timestamps use chrono.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Users
// =============================================================================

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// PHC string produced by argon2
    pub password_hash: String,
    /// Whether the account's email was confirmed
    pub confirmed: bool,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Messages newer than this are unread
    pub last_message_read_time: Option<DateTime<Utc>>,
}

/// Fields accepted by a registration
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Editable profile fields
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: String,
    pub about_me: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
}

// =============================================================================
// Posts, comments, likes
// =============================================================================

/// A post on a user's timeline
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    /// Plain text as submitted
    pub body: String,
    /// Escaped HTML rendering of `body`
    pub body_html: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
}

/// A post joined with its author's username
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostWithAuthor {
    pub id: i64,
    pub body: String,
    pub body_html: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub comment_count: i64,
}

/// A comment on a post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
    pub post_id: i64,
}

/// A comment joined with its author's username
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub post_id: i64,
}

/// Like relationship between a user and a post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Like {
    pub id: i64,
    pub author_id: i64,
    pub post_id: i64,
}

/// Result of toggling a like
#[derive(Debug, Clone)]
pub enum LikeToggle {
    /// A new like row was created
    Liked(Like),
    /// The existing like was removed
    Unliked { author_id: i64, post_id: i64 },
}

// =============================================================================
// Follow relationships
// =============================================================================

/// `follower_id` follows `followed_id`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub follower_id: i64,
    pub followed_id: i64,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Messages and notifications
// =============================================================================

/// Direct message between two users
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// A message joined with its sender's username
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageWithSender {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub recipient_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Named notification for a user
///
/// Only the latest notification of each name is kept per user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// JSON-encoded payload
    pub payload_json: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl Notification {
    /// Decode the stored payload, falling back to JSON null.
    pub fn data(&self) -> serde_json::Value {
        serde_json::from_str(&self.payload_json).unwrap_or(serde_json::Value::Null)
    }
}

/// Notification names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationName {
    UnreadMessageCount,
}

impl NotificationName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnreadMessageCount => "unread_message_count",
        }
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// `None` on the last page, or when the page number cannot grow
    pub fn next_num(&self) -> Option<u32> {
        self.page.checked_add(1).filter(|_| self.has_next)
    }

    pub fn prev_num(&self) -> Option<u32> {
        self.has_prev().then(|| self.page - 1)
    }
}

/// Stored form of an email address; lookups must use the same form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Current time as fractional seconds since the Unix epoch
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
