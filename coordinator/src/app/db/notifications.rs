use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub(crate) struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, user_id, message, is_read, created_at";

pub(crate) async fn insert(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
    message: &str,
) -> sqlx::Result<Notification> {
    sqlx::query_as::<_, Notification>(&format!(
        "INSERT INTO notifications (user_id, message, created_at) VALUES (?, ?, ?) \
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(message)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

/// Newest first.
pub(crate) async fn list_for_user(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
) -> sqlx::Result<Vec<Notification>> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {COLUMNS} FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Returns `false` if no notification `id` belongs to `user_id`.
pub(crate) async fn mark_read(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    user_id: i64,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn mark_all_read(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
) -> sqlx::Result<u64> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
            .bind(user_id)
            .execute(executor)
            .await?;
    Ok(result.rows_affected())
}

/// Returns `false` if no notification `id` belongs to `user_id`.
pub(crate) async fn delete(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    user_id: i64,
) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn delete_read(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM notifications WHERE user_id = ? AND is_read = 1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
pub(crate) async fn count_for_user(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(executor)
        .await
}
