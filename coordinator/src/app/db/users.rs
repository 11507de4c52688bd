use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub(crate) struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

pub(crate) async fn find_by_id(
    executor: impl SqliteExecutor<'_>,
    id: i64,
) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, is_admin, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_by_username(
    executor: impl SqliteExecutor<'_>,
    username: &str,
) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, is_admin, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(executor)
    .await
}

/// Inserts a user, returning `None` if the username is already taken.
pub(crate) async fn insert_if_absent(
    executor: impl SqliteExecutor<'_>,
    username: &str,
    email: &str,
    is_admin: bool,
) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, is_admin, created_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT(username) DO NOTHING \
         RETURNING id, username, email, is_admin, created_at",
    )
    .bind(username)
    .bind(email)
    .bind(is_admin)
    .bind(Utc::now())
    .fetch_optional(executor)
    .await
}

/// Refreshes the fields taken from the authenticating proxy and the admin list.
pub(crate) async fn update_profile(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    email: &str,
    is_admin: bool,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET email = ?, is_admin = ? WHERE id = ?")
        .bind(email)
        .bind(is_admin)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn admin_ids(executor: impl SqliteExecutor<'_>) -> sqlx::Result<Vec<i64>> {
    sqlx::query_scalar("SELECT id FROM users WHERE is_admin = 1 ORDER BY id")
        .fetch_all(executor)
        .await
}

pub(crate) async fn list(executor: impl SqliteExecutor<'_>) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, is_admin, created_at FROM users ORDER BY id",
    )
    .fetch_all(executor)
    .await
}
