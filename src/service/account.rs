//! Account service
//!
//! Registration, login, profile edits and follow relationships.

use std::sync::Arc;

use crate::auth::{hash_password, verify_password};
use crate::data::{Database, NewUser, ProfileUpdate, User, normalize_email};
use crate::error::AppError;
use crate::replica::{DualWriteDispatcher, Mutation};

use super::{ABOUT_ME_MAX_CHARS, require_text};

const USERNAME_MAX_CHARS: usize = 64;
const EMAIL_MAX_CHARS: usize = 120;

fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Follower and following totals for a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

/// Account service
pub struct AccountService {
    db: Arc<Database>,
    replica: DualWriteDispatcher,
}

impl AccountService {
    pub fn new(db: Arc<Database>, replica: DualWriteDispatcher) -> Self {
        Self { db, replica }
    }

    /// Register a new, unconfirmed user
    ///
    /// The email is stored lowercased.
    ///
    /// # Errors
    /// `Validation` for malformed input, `Conflict` when the username or
    /// email is taken
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let username = require_text("username", username, USERNAME_MAX_CHARS)?;
        let email = normalize_email(require_text("email", email, EMAIL_MAX_CHARS)?);
        if !email.contains('@') {
            return Err(AppError::Validation("Invalid email address.".to_string()));
        }
        if password.is_empty() {
            return Err(AppError::Validation("password is required".to_string()));
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

        let user = self
            .db
            .insert_user(&NewUser {
                username: username.to_string(),
                email,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        self.replica
            .dispatch("register_user", Mutation::UpsertUser(user.clone()));
        Ok(user)
    }

    /// Check credentials; `login` may be a username or an email address.
    ///
    /// # Errors
    /// `Unauthorized` for an unknown login or wrong password
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<User, AppError> {
        let user = self
            .db
            .get_user_by_login(login.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        if !valid {
            tracing::debug!(user_id = user.id, "Rejected login with wrong password");
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Mark a user's email as confirmed.
    pub async fn confirm(&self, user_id: i64) -> Result<User, AppError> {
        let user = self.db.confirm_user(user_id).await?;
        tracing::info!(user_id, "User confirmed");
        self.replica
            .dispatch("confirm_user", Mutation::UpsertUser(user.clone()));
        Ok(user)
    }

    /// Replace a user's password.
    pub async fn reset_password(&self, user_id: i64, new_password: &str) -> Result<User, AppError> {
        if new_password.is_empty() {
            return Err(AppError::Validation("password is required".to_string()));
        }

        let password = new_password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

        let user = self.db.set_password_hash(user_id, &password_hash).await?;
        tracing::info!(user_id, "Password reset");
        self.replica
            .dispatch("reset_password", Mutation::UpsertUser(user.clone()));
        Ok(user)
    }

    /// Update editable profile fields
    ///
    /// # Errors
    /// `Validation` for an empty username or an over-long about-me,
    /// `Conflict` when renaming to a taken username
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<User, AppError> {
        let username = require_text("username", &update.username, USERNAME_MAX_CHARS)?.to_string();
        let about_me = normalize_optional_text(update.about_me);
        if about_me
            .as_ref()
            .is_some_and(|about| about.chars().count() > ABOUT_ME_MAX_CHARS)
        {
            return Err(AppError::Validation(format!(
                "about_me must be at most {ABOUT_ME_MAX_CHARS} characters"
            )));
        }

        let update = ProfileUpdate {
            username,
            about_me,
            name: normalize_optional_text(update.name),
            headline: normalize_optional_text(update.headline),
            location: normalize_optional_text(update.location),
        };

        let user = self.db.update_profile(user_id, &update).await?;
        self.replica
            .dispatch("update_profile", Mutation::UpsertUser(user.clone()));
        Ok(user)
    }

    /// Look up a user by username.
    pub async fn profile(&self, username: &str) -> Result<User, AppError> {
        self.db
            .get_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn follow_counts(&self, user_id: i64) -> Result<FollowCounts, AppError> {
        Ok(FollowCounts {
            followers: self.db.count_followers(user_id).await?,
            following: self.db.count_following(user_id).await?,
        })
    }

    pub async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, AppError> {
        self.db.is_following(follower_id, followed_id).await
    }

    /// Follow `username`
    ///
    /// Following someone already followed is a no-op and dispatches nothing.
    ///
    /// # Errors
    /// `NotFound` for an unknown user, `Validation` for a self-follow
    pub async fn follow(&self, follower: &User, username: &str) -> Result<User, AppError> {
        let followed = self.profile(username).await?;
        if followed.id == follower.id {
            return Err(AppError::Validation("You cannot follow yourself!".to_string()));
        }

        if let Some(follow) = self.db.follow(follower.id, followed.id).await? {
            tracing::info!(follower_id = follower.id, followed_id = followed.id, "Followed user");
            self.replica.dispatch("follow", Mutation::UpsertFollow(follow));
        }
        Ok(followed)
    }

    /// Stop following `username`
    ///
    /// # Errors
    /// `NotFound` for an unknown user, `Validation` for a self-unfollow
    pub async fn unfollow(&self, follower: &User, username: &str) -> Result<User, AppError> {
        let followed = self.profile(username).await?;
        if followed.id == follower.id {
            return Err(AppError::Validation("You cannot unfollow yourself!".to_string()));
        }

        if self.db.unfollow(follower.id, followed.id).await? {
            tracing::info!(follower_id = follower.id, followed_id = followed.id, "Unfollowed user");
            self.replica.dispatch(
                "unfollow",
                Mutation::DeleteFollow {
                    follower_id: follower.id,
                    followed_id: followed.id,
                },
            );
        }
        Ok(followed)
    }
}
