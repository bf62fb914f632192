//! Authentication extractor
//!
//! Resolves the session token on a request to the caller's user row.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use super::session::verify_session_token;
use crate::AppState;
use crate::data::User;
use crate::error::AppError;

/// Name of the cookie that may carry the session token
pub const SESSION_COOKIE: &str = "session";

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_owned())
        })
}

/// Extractor for the authenticated caller
///
/// Loads the user named by the session from the primary store and records
/// the request as the user's `last_seen`. A token for a deleted user is
/// rejected.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>().cloned() {
            return Ok(CurrentUser(user));
        }

        let state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
        let session = verify_session_token(&token, &state.config.auth.session_secret)?;

        let mut user = state
            .db
            .get_user(session.user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let now = Utc::now();
        state.db.touch_last_seen(user.id, now).await?;
        user.last_seen = now;

        parts.extensions.insert(user.clone());
        Ok(CurrentUser(user))
    }
}
