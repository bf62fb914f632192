//! API request and response DTOs
//!
//! Response types never carry password hashes. Email addresses are only
//! shown to their owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{
    CommentWithAuthor, MessageWithSender, Notification, Page, PostWithAuthor, User,
};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email address
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Body of a new post, comment or message
#[derive(Debug, Deserialize)]
pub struct BodyRequest {
    #[serde(alias = "post", alias = "message")]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct EditProfileRequest {
    pub username: String,
    pub about_me: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
}

/// `?page=`; a missing or unparsable value means the first page
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

impl PageParams {
    /// Requested page, 1-based
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(1)
            .max(1)
    }
}

/// `?since=`; a missing or unparsable value means 0
#[derive(Debug, Default, Deserialize)]
pub struct SinceParams {
    pub since: Option<String>,
}

impl SinceParams {
    /// Epoch seconds
    pub fn since(&self) -> f64 {
        self.since
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|since| since.is_finite())
            .unwrap_or(0.0)
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub confirmed: bool,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl UserResponse {
    /// View of another user
    pub fn public(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: None,
            confirmed: user.confirmed,
            name: user.name.clone(),
            headline: user.headline.clone(),
            location: user.location.clone(),
            about_me: user.about_me.clone(),
            member_since: user.member_since,
            last_seen: user.last_seen,
        }
    }

    /// View of the caller's own account
    pub fn own(user: &User) -> Self {
        Self {
            email: Some(user.email.clone()),
            ..Self::public(user)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub body: String,
    pub body_html: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub comment_count: i64,
}

impl From<PostWithAuthor> for PostResponse {
    fn from(post: PostWithAuthor) -> Self {
        Self {
            id: post.id,
            body: post.body,
            body_html: post.body_html,
            timestamp: post.timestamp,
            author_id: post.author_id,
            author_username: post.author_username,
            comment_count: post.comment_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
}

impl From<CommentWithAuthor> for CommentResponse {
    fn from(comment: CommentWithAuthor) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            body: comment.body,
            timestamp: comment.timestamp,
            author_id: comment.author_id,
            author_username: comment.author_username,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetailResponse {
    pub post: PostResponse,
    pub comments: Vec<CommentResponse>,
    pub likes: i64,
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub recipient_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl From<MessageWithSender> for MessageResponse {
    fn from(message: MessageWithSender) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            sender_username: message.sender_username,
            recipient_id: message.recipient_id,
            body: message.body,
            timestamp: message.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub name: String,
    pub data: serde_json::Value,
    pub timestamp: f64,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            data: notification.data(),
            name: notification.name,
            timestamp: notification.timestamp,
        }
    }
}

/// One page of a listing with links to its neighbours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub next_url: Option<String>,
    pub prev_url: Option<String>,
}

impl<T> PageResponse<T> {
    /// Convert a page, linking neighbours as `{path}?page=N`
    pub fn from_page<U>(page: Page<U>, path: &str) -> Self
    where
        T: From<U>,
    {
        let link = |num: u32| format!("{path}?page={num}");
        Self {
            next_url: page.next_num().map(link),
            prev_url: page.prev_num().map(link),
            page: page.page,
            items: page.items.into_iter().map(T::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub followers: i64,
    pub following: i64,
    /// Whether the caller follows this user
    pub is_following: bool,
    pub posts: PageResponse<PostResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopupResponse {
    pub user: UserResponse,
    pub followers: i64,
    pub following: i64,
    pub is_following: bool,
}
