//! Post endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use super::dto::{
    BodyRequest, CommentResponse, LikeResponse, PageParams, PageResponse, PostDetailResponse,
    PostResponse,
};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create_post))
        .route("/index", get(index).post(create_post))
        .route("/explore", get(explore))
        .route("/post/:post_id", get(post_detail).post(create_comment))
        .route("/post/:post_id/like", post(toggle_like))
}

/// GET /index
///
/// The caller's most recent posts.
async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let posts = state.post_service().recent_posts(&user).await?;
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

/// POST /index
async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<BodyRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let post = state.post_service().create_post(&user, &req.body).await?;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: post.id,
            body: post.body,
            body_html: post.body_html,
            timestamp: post.timestamp,
            author_id: post.author_id,
            author_username: user.username,
            comment_count: 0,
        }),
    ))
}

/// GET /explore?page=
async fn explore(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<PostResponse>>, AppError> {
    let page = state.post_service().explore(params.page()).await?;
    Ok(Json(PageResponse::from_page(page, "/explore")))
}

/// GET /post/:post_id
async fn post_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
) -> Result<Json<PostDetailResponse>, AppError> {
    let detail = state.post_service().post_detail(post_id, &user).await?;

    Ok(Json(PostDetailResponse {
        post: detail.post.into(),
        comments: detail.comments.into_iter().map(CommentResponse::from).collect(),
        likes: detail.likes,
        liked: detail.liked_by_viewer,
    }))
}

/// POST /post/:post_id
async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
    Json(req): Json<BodyRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let comment = state
        .post_service()
        .create_comment(&user, post_id, &req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// POST /post/:post_id/like
async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
) -> Result<Json<LikeResponse>, AppError> {
    let summary = state.post_service().toggle_like(&user, post_id).await?;
    Ok(Json(LikeResponse {
        liked: summary.liked,
        likes: summary.likes,
    }))
}
