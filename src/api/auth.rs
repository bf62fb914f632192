//! Account endpoints
//!
//! Routes:
//! - POST /auth/register
//! - POST /auth/login
//! - POST /auth/logout
//! - POST /auth/confirm
//! - POST /auth/reset_password

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::dto::{LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest, UserResponse};
use crate::AppState;
use crate::auth::{CurrentUser, SESSION_COOKIE, Session, create_session_token};
use crate::error::AppError;

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/confirm", post(confirm))
        .route("/auth/reset_password", post(reset_password))
}

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state
        .account_service()
        .register(&req.username, &req.email, &req.password)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::own(&user))))
}

/// POST /auth/login
///
/// Returns the session token and also sets it as an HTTP-only cookie.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .account_service()
        .authenticate(&req.login, &req.password)
        .await?;

    let session = Session::for_user(&user, state.config.auth.session_max_age);
    let token = create_session_token(&session, &state.config.auth.session_secret)?;
    tracing::info!(user_id = user.id, "User logged in");

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token,
            user: UserResponse::own(&user),
        }),
    ))
}

/// POST /auth/logout
async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

/// POST /auth/confirm
async fn confirm(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.account_service().confirm(user.id).await?;
    Ok(Json(UserResponse::own(&user)))
}

/// POST /auth/reset_password
async fn reset_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .account_service()
        .reset_password(user.id, &req.password)
        .await?;
    Ok(Json(UserResponse::own(&user)))
}
