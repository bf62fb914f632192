//! Message and notification endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use super::dto::{
    BodyRequest, MessageResponse, NotificationResponse, PageParams, PageResponse, SinceParams,
};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

pub fn messages_router() -> Router<AppState> {
    Router::new()
        .route("/send_message/:recipient", post(send_message))
        .route("/messages", get(messages))
        .route("/notifications", get(notifications))
}

/// POST /send_message/:recipient
async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipient): Path<String>,
    Json(req): Json<BodyRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let message = state
        .message_service()
        .send_message(&user, &recipient, &req.body)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message.id,
            sender_id: message.sender_id,
            sender_username: user.username,
            recipient_id: message.recipient_id,
            body: message.body,
            timestamp: message.timestamp,
        }),
    ))
}

/// GET /messages?page=
///
/// Opening the inbox marks every message read.
async fn messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<MessageResponse>>, AppError> {
    let page = state
        .message_service()
        .read_messages(&user, params.page())
        .await?;
    Ok(Json(PageResponse::from_page(page, "/messages")))
}

/// GET /notifications?since=
async fn notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SinceParams>,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    let since = params.since();
    let notifications = state
        .message_service()
        .notifications_since(&user, since)
        .await?;

    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}
