//! Replica mutations
//!
//! Each variant carries the scalar fields needed to re-apply a committed
//! primary-store write against the secondary store.

use crate::data::{Comment, Follow, Like, Message, Notification, Post, User};

/// A primary-store write to be mirrored on the secondary store
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Full user row; used for registration, confirmation,
    /// profile updates and password resets
    UpsertUser(User),
    UpsertPost(Post),
    UpsertComment(Comment),
    UpsertLike(Like),
    DeleteLike { author_id: i64, post_id: i64 },
    UpsertFollow(Follow),
    DeleteFollow { follower_id: i64, followed_id: i64 },
    UpsertMessage(Message),
    /// Replaces any notification of the same name for the same user
    ReplaceNotification(Notification),
}

impl Mutation {
    /// Entity label for logs and metrics
    pub fn entity(&self) -> &'static str {
        match self {
            Self::UpsertUser(_) => "user",
            Self::UpsertPost(_) => "post",
            Self::UpsertComment(_) => "comment",
            Self::UpsertLike(_) | Self::DeleteLike { .. } => "like",
            Self::UpsertFollow(_) | Self::DeleteFollow { .. } => "follow",
            Self::UpsertMessage(_) => "message",
            Self::ReplaceNotification(_) => "notification",
        }
    }

    /// Primary key of the affected row, e.g. `post:12` or `follow:3->4`
    pub fn key(&self) -> String {
        match self {
            Self::UpsertUser(user) => format!("user:{}", user.id),
            Self::UpsertPost(post) => format!("post:{}", post.id),
            Self::UpsertComment(comment) => format!("comment:{}", comment.id),
            Self::UpsertLike(like) => format!("like:{}->{}", like.author_id, like.post_id),
            Self::DeleteLike { author_id, post_id } => format!("like:{author_id}->{post_id}"),
            Self::UpsertFollow(follow) => {
                format!("follow:{}->{}", follow.follower_id, follow.followed_id)
            }
            Self::DeleteFollow {
                follower_id,
                followed_id,
            } => format!("follow:{follower_id}->{followed_id}"),
            Self::UpsertMessage(message) => format!("message:{}", message.id),
            Self::ReplaceNotification(notification) => {
                format!("notification:{}", notification.id)
            }
        }
    }
}
