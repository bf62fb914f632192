//! Message service
//!
//! Direct messages and the notifications they raise.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::data::{
    Database, Message, MessageWithSender, Notification, NotificationName, Page, User,
    epoch_seconds,
};
use crate::error::AppError;
use crate::replica::{DualWriteDispatcher, Mutation};

use super::{SHORT_TEXT_MAX_CHARS, require_text};

/// Message service
pub struct MessageService {
    db: Arc<Database>,
    replica: DualWriteDispatcher,
    per_page: usize,
}

impl MessageService {
    pub fn new(db: Arc<Database>, replica: DualWriteDispatcher, per_page: usize) -> Self {
        Self {
            db,
            replica,
            per_page,
        }
    }

    /// Send a message and refresh the recipient's unread counter
    ///
    /// # Errors
    /// `NotFound` for an unknown recipient, `Validation` for an empty or
    /// over-long body
    pub async fn send_message(
        &self,
        sender: &User,
        recipient_username: &str,
        body: &str,
    ) -> Result<Message, AppError> {
        let body = require_text("message", body, SHORT_TEXT_MAX_CHARS)?;
        let recipient = self
            .db
            .get_user_by_username(recipient_username)
            .await?
            .ok_or(AppError::NotFound)?;

        let (message, notification) = self
            .db
            .send_message(sender.id, recipient.id, body, Utc::now())
            .await?;
        tracing::info!(
            message_id = message.id,
            sender_id = sender.id,
            recipient_id = recipient.id,
            "Message sent"
        );
        self.replica
            .dispatch("send_message", Mutation::UpsertMessage(message.clone()));
        self.replica.dispatch(
            "add_notification",
            Mutation::ReplaceNotification(notification),
        );

        Ok(message)
    }

    /// Open the inbox: mark everything read and return one page
    pub async fn read_messages(
        &self,
        user: &User,
        page: u32,
    ) -> Result<Page<MessageWithSender>, AppError> {
        let user_after = self.db.mark_messages_read(user.id, Utc::now()).await?;
        self.replica
            .dispatch("read_messages", Mutation::UpsertUser(user_after));
        self.notify_unread(user.id, 0).await?;

        self.db
            .messages_received_page(user.id, page, self.per_page)
            .await
    }

    /// Notifications newer than `since` (epoch seconds), oldest first
    pub async fn notifications_since(
        &self,
        user: &User,
        since: f64,
    ) -> Result<Vec<Notification>, AppError> {
        self.db.notifications_since(user.id, since).await
    }

    async fn notify_unread(&self, user_id: i64, unread: i64) -> Result<Notification, AppError> {
        let notification = self
            .db
            .replace_notification(
                user_id,
                NotificationName::UnreadMessageCount.as_str(),
                &json!(unread),
                epoch_seconds(Utc::now()),
            )
            .await?;
        self.replica.dispatch(
            "add_notification",
            Mutation::ReplaceNotification(notification.clone()),
        );
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NewUser;
    use tempfile::TempDir;

    async fn create_service() -> (MessageService, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("service-message.db"))
                .await
                .unwrap(),
        );
        let service = MessageService::new(db.clone(), DualWriteDispatcher::disabled(), 10);
        (service, db, temp_dir)
    }

    async fn create_user(db: &Database, username: &str) -> User {
        db.insert_user(&NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn sending_updates_unread_notification() {
        let (service, db, _temp_dir) = create_service().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        service.send_message(&alice, "bob", "one").await.unwrap();
        service.send_message(&alice, "bob", "two").await.unwrap();

        let notifications = service.notifications_since(&bob, 0.0).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].name, "unread_message_count");
        assert_eq!(notifications[0].data(), json!(2));
    }

    #[tokio::test]
    async fn reading_resets_counter() {
        let (service, db, _temp_dir) = create_service().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        service.send_message(&alice, "bob", "hello").await.unwrap();

        let page = service.read_messages(&bob, 1).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].sender_username, "alice");

        let notifications = service.notifications_since(&bob, 0.0).await.unwrap();
        assert_eq!(notifications[0].data(), json!(0));
        assert_eq!(db.unread_message_count(bob.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn send_rejects_unknown_recipient_and_long_body() {
        let (service, db, _temp_dir) = create_service().await;
        let alice = create_user(&db, "alice").await;
        create_user(&db, "bob").await;

        assert!(matches!(
            service.send_message(&alice, "carol", "hi").await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            service
                .send_message(&alice, "bob", &"x".repeat(SHORT_TEXT_MAX_CHARS + 1))
                .await,
            Err(AppError::Validation(_))
        ));
    }
}
