//! Persisting notifications and fanning them out to users.
//!
//! The stored row is authoritative. Live and push delivery are best effort: pooled messages are
//! lost on restart and push failures are only logged.

use alloc::sync::Arc;

use sqlx::SqliteConnection;
use thiserror::Error as ThisError;
use tracing::{debug, warn};

use super::registry::{ConnectionRegistry, Delivery};
use crate::{
    app::db::{self, DbPool, NewSubscription, Notification, Subscription},
    integrations::{PushOutcome, PushSender},
    websocket::WsMessage,
};

#[derive(Debug, ThisError)]
pub(crate) enum NotificationError {
    #[error("notification not found")]
    NotFound,
    #[error("storage error")]
    Storage(#[from] sqlx::Error),
}

#[derive(Clone)]
pub(crate) struct NotificationService {
    pool: DbPool,
    registry: Arc<ConnectionRegistry>,
    push: Option<Arc<dyn PushSender>>,
}

impl NotificationService {
    pub(crate) fn new(
        pool: DbPool,
        registry: Arc<ConnectionRegistry>,
        push: Option<Arc<dyn PushSender>>,
    ) -> Self {
        Self {
            pool,
            registry,
            push,
        }
    }

    pub(crate) const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Stores a notification for `user_id` and delivers it.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be stored. Delivery problems are not errors.
    #[tracing::instrument(skip(self, message), err(Debug))]
    pub(crate) async fn create_notification(
        &self,
        user_id: i64,
        message: &str,
    ) -> Result<Notification, NotificationError> {
        let notification = db::notifications::insert(&self.pool, user_id, message).await?;
        self.deliver(&notification).await;
        Ok(notification)
    }

    /// Sends `message` to every admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the admins cannot be listed or a notification cannot be stored.
    #[tracing::instrument(skip(self, message), err(Debug))]
    pub(crate) async fn create_admin_notification(
        &self,
        message: &str,
    ) -> Result<Vec<Notification>, NotificationError> {
        let mut created = Vec::new();
        for admin_id in db::users::admin_ids(&self.pool).await? {
            created.push(self.create_notification(admin_id, message).await?);
        }
        Ok(created)
    }

    /// Stores a notification as part of an open transaction.
    ///
    /// Nothing is delivered; call [`Self::deliver`] once the transaction is committed.
    pub(crate) async fn record(
        conn: &mut SqliteConnection,
        user_id: i64,
        message: &str,
    ) -> sqlx::Result<Notification> {
        db::notifications::insert(conn, user_id, message).await
    }

    /// Like [`Self::record`] for every admin.
    pub(crate) async fn record_for_admins(
        conn: &mut SqliteConnection,
        message: &str,
    ) -> sqlx::Result<Vec<Notification>> {
        let mut created = Vec::new();
        for admin_id in db::users::admin_ids(&mut *conn).await? {
            created.push(db::notifications::insert(&mut *conn, admin_id, message).await?);
        }
        Ok(created)
    }

    /// Delivers a stored notification over the live connection, or pools and pushes it.
    pub(crate) async fn deliver(&self, notification: &Notification) {
        let delivery = self
            .registry
            .deliver(notification.user_id, WsMessage::from(notification))
            .await;
        debug!(user_id = notification.user_id, ?delivery, "Notification delivered");
        if delivery == Delivery::Pooled {
            self.push(notification).await;
        }
    }

    pub(crate) async fn deliver_all(&self, notifications: &[Notification]) {
        for notification in notifications {
            self.deliver(notification).await;
        }
    }

    async fn push(&self, notification: &Notification) {
        let Some(ref push) = self.push else {
            return;
        };
        let subscriptions = match db::subscriptions::list_for_user(&self.pool, notification.user_id)
            .await
        {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                warn!("Failed to load push subscriptions: {e}");
                return;
            }
        };
        for subscription in subscriptions {
            match push.send(&subscription, &notification.message).await {
                Ok(PushOutcome::Delivered) => {}
                Ok(PushOutcome::Gone) => {
                    debug!(endpoint = %subscription.endpoint, "Removing expired push subscription");
                    if let Err(e) = db::subscriptions::delete(&self.pool, subscription.id).await {
                        warn!("Failed to remove expired push subscription: {e}");
                    }
                }
                Err(e) => {
                    warn!(endpoint = %subscription.endpoint, "Push delivery failed: {e:#}");
                }
            }
        }
    }

    pub(crate) async fn list(&self, user_id: i64) -> Result<Vec<Notification>, NotificationError> {
        Ok(db::notifications::list_for_user(&self.pool, user_id).await?)
    }

    /// # Errors
    ///
    /// [`NotificationError::NotFound`] if the notification does not exist or belongs to someone else.
    pub(crate) async fn mark_read(&self, user_id: i64, id: i64) -> Result<(), NotificationError> {
        if db::notifications::mark_read(&self.pool, id, user_id).await? {
            Ok(())
        } else {
            Err(NotificationError::NotFound)
        }
    }

    /// Returns the number of notifications that were unread.
    pub(crate) async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationError> {
        Ok(db::notifications::mark_all_read(&self.pool, user_id).await?)
    }

    /// # Errors
    ///
    /// [`NotificationError::NotFound`] if the notification does not exist or belongs to someone else.
    pub(crate) async fn delete(&self, user_id: i64, id: i64) -> Result<(), NotificationError> {
        if db::notifications::delete(&self.pool, id, user_id).await? {
            Ok(())
        } else {
            Err(NotificationError::NotFound)
        }
    }

    /// Returns the number of deleted notifications.
    pub(crate) async fn delete_read(&self, user_id: i64) -> Result<u64, NotificationError> {
        Ok(db::notifications::delete_read(&self.pool, user_id).await?)
    }

    pub(crate) async fn subscribe(
        &self,
        user_id: i64,
        subscription: &NewSubscription,
    ) -> Result<Subscription, NotificationError> {
        Ok(db::subscriptions::upsert(&self.pool, user_id, subscription).await?)
    }
}

impl From<&Notification> for WsMessage {
    fn from(notification: &Notification) -> Self {
        Self::Notification {
            id: notification.id,
            message: notification.message.clone(),
            created_at: notification.created_at,
        }
    }
}
