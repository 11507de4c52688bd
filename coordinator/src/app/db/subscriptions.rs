use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor};

/// A browser push registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub(crate) struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

/// Subscription as produced by `PushManager.subscribe()` in the browser.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NewSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

const COLUMNS: &str = "id, user_id, endpoint, p256dh, auth, created_at";

/// Registers `subscription` for `user_id`, taking over the endpoint if it was known before.
pub(crate) async fn upsert(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
    subscription: &NewSubscription,
) -> sqlx::Result<Subscription> {
    sqlx::query_as::<_, Subscription>(&format!(
        "INSERT INTO subscriptions (user_id, endpoint, p256dh, auth, created_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(endpoint) DO UPDATE SET \
         user_id = excluded.user_id, p256dh = excluded.p256dh, auth = excluded.auth \
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(&subscription.endpoint)
    .bind(&subscription.keys.p256dh)
    .bind(&subscription.keys.auth)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_for_user(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
) -> sqlx::Result<Vec<Subscription>> {
    sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {COLUMNS} FROM subscriptions WHERE user_id = ? ORDER BY id"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn delete(executor: impl SqliteExecutor<'_>, id: i64) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM subscriptions WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}
