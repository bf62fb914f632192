//! Post service
//!
//! Posts, comments and likes.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{CommentWithAuthor, Database, LikeToggle, Page, Post, PostWithAuthor, User};
use crate::error::AppError;
use crate::replica::{DualWriteDispatcher, Mutation};

use super::{SHORT_TEXT_MAX_CHARS, require_text};

/// Render a plain-text body as escaped HTML, one paragraph per line block.
fn render_body_html(body: &str) -> String {
    body.split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(|paragraph| {
            let escaped = html_escape::encode_text(paragraph);
            format!("<p>{}</p>", escaped.replace('\n', "<br>"))
        })
        .collect()
}

/// A post with everything its detail page shows
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostWithAuthor,
    /// Oldest first
    pub comments: Vec<CommentWithAuthor>,
    pub likes: i64,
    pub liked_by_viewer: bool,
}

/// Like state after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeSummary {
    pub liked: bool,
    pub likes: i64,
}

/// Post service
pub struct PostService {
    db: Arc<Database>,
    replica: DualWriteDispatcher,
    posts_per_page: usize,
    recent_posts: usize,
}

impl PostService {
    pub fn new(
        db: Arc<Database>,
        replica: DualWriteDispatcher,
        posts_per_page: usize,
        recent_posts: usize,
    ) -> Self {
        Self {
            db,
            replica,
            posts_per_page,
            recent_posts,
        }
    }

    /// Publish a post for `author`
    ///
    /// # Errors
    /// `Validation` for an empty body
    pub async fn create_post(&self, author: &User, body: &str) -> Result<Post, AppError> {
        let body = require_text("post", body, usize::MAX)?;
        let body_html = render_body_html(body);

        let post = self
            .db
            .insert_post(author.id, body, &body_html, Utc::now())
            .await?;

        tracing::info!(post_id = post.id, author_id = author.id, "Post created");
        self.replica.dispatch("create_post", Mutation::UpsertPost(post.clone()));
        Ok(post)
    }

    /// The author's most recent posts, newest first
    pub async fn recent_posts(&self, author: &User) -> Result<Vec<PostWithAuthor>, AppError> {
        self.db
            .recent_posts_by_author(author.id, self.recent_posts)
            .await
    }

    /// Every post, newest first
    pub async fn explore(&self, page: u32) -> Result<Page<PostWithAuthor>, AppError> {
        self.db.posts_page(page, self.posts_per_page).await
    }

    /// One author's posts, newest first
    pub async fn user_posts(&self, author: &User, page: u32) -> Result<Page<PostWithAuthor>, AppError> {
        self.db
            .posts_by_author_page(author.id, page, self.posts_per_page)
            .await
    }

    pub async fn post_detail(&self, post_id: i64, viewer: &User) -> Result<PostDetail, AppError> {
        let post = self.db.get_post(post_id).await?.ok_or(AppError::NotFound)?;
        let comments = self.db.comments_for_post(post_id).await?;
        let likes = self.db.count_likes(post_id).await?;
        let liked_by_viewer = self.db.is_liked(viewer.id, post_id).await?;

        Ok(PostDetail {
            post,
            comments,
            likes,
            liked_by_viewer,
        })
    }

    /// Comment on a post
    ///
    /// # Errors
    /// `NotFound` for an unknown post, `Validation` for an empty or
    /// over-long body
    pub async fn create_comment(
        &self,
        author: &User,
        post_id: i64,
        body: &str,
    ) -> Result<CommentWithAuthor, AppError> {
        let body = require_text("comment", body, SHORT_TEXT_MAX_CHARS)?;
        if self.db.get_post(post_id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let comment = self
            .db
            .insert_comment(post_id, author.id, body, Utc::now())
            .await?;

        tracing::info!(comment_id = comment.id, post_id, "Comment created");
        self.replica
            .dispatch("create_comment", Mutation::UpsertComment(comment.clone()));

        Ok(CommentWithAuthor {
            id: comment.id,
            body: comment.body,
            timestamp: comment.timestamp,
            author_id: comment.author_id,
            author_username: author.username.clone(),
            post_id: comment.post_id,
        })
    }

    /// Like the post, or remove the viewer's existing like.
    pub async fn toggle_like(&self, viewer: &User, post_id: i64) -> Result<LikeSummary, AppError> {
        if self.db.get_post(post_id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let liked = match self.db.toggle_like(viewer.id, post_id).await? {
            LikeToggle::Liked(like) => {
                self.replica.dispatch("like", Mutation::UpsertLike(like));
                true
            }
            LikeToggle::Unliked { author_id, post_id } => {
                self.replica
                    .dispatch("unlike", Mutation::DeleteLike { author_id, post_id });
                false
            }
        };

        Ok(LikeSummary {
            liked,
            likes: self.db.count_likes(post_id).await?,
        })
    }
}
