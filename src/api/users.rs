//! User, profile and follow endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use super::dto::{
    EditProfileRequest, PageParams, PageResponse, PopupResponse, ProfileResponse, UserResponse,
};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::ProfileUpdate;
use crate::error::AppError;

pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/user/:username", get(profile))
        .route("/user/:username/popup", get(popup))
        .route("/edit_profile", get(get_profile).post(edit_profile))
        .route("/follow/:username", post(follow))
        .route("/unfollow/:username", post(unfollow))
}

/// GET /user/:username?page=
async fn profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ProfileResponse>, AppError> {
    let accounts = state.account_service();
    let user = accounts.profile(&username).await?;
    let counts = accounts.follow_counts(user.id).await?;
    let is_following = accounts.is_following(viewer.id, user.id).await?;
    let posts = state
        .post_service()
        .user_posts(&user, params.page())
        .await?;

    let user_view = if user.id == viewer.id {
        UserResponse::own(&user)
    } else {
        UserResponse::public(&user)
    };

    Ok(Json(ProfileResponse {
        posts: PageResponse::from_page(posts, &format!("/user/{}", user.username)),
        user: user_view,
        followers: counts.followers,
        following: counts.following,
        is_following,
    }))
}

/// GET /user/:username/popup
async fn popup(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<PopupResponse>, AppError> {
    let accounts = state.account_service();
    let user = accounts.profile(&username).await?;
    let counts = accounts.follow_counts(user.id).await?;

    Ok(Json(PopupResponse {
        is_following: accounts.is_following(viewer.id, user.id).await?,
        user: UserResponse::public(&user),
        followers: counts.followers,
        following: counts.following,
    }))
}

/// GET /edit_profile
async fn get_profile(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::own(&user))
}

/// POST /edit_profile
async fn edit_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<EditProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .account_service()
        .update_profile(
            user.id,
            ProfileUpdate {
                username: req.username,
                about_me: req.about_me,
                name: req.name,
                headline: req.headline,
                location: req.location,
            },
        )
        .await?;

    Ok(Json(UserResponse::own(&user)))
}

/// POST /follow/:username
async fn follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let followed = state.account_service().follow(&user, &username).await?;
    Ok(Json(UserResponse::public(&followed)))
}

/// POST /unfollow/:username
async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let unfollowed = state.account_service().unfollow(&user, &username).await?;
    Ok(Json(UserResponse::public(&unfollowed)))
}
