use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

/// A row of `extra_hostnames`, active unless `deleted_at` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub(crate) struct ExtraHostname {
    pub id: i64,
    pub application_id: i64,
    pub hostname: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ExtraHostname {
    pub(crate) const fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

const COLUMNS: &str = "id, application_id, hostname, deleted_at, created_at";

/// Looks up a hostname including soft-deleted rows.
pub(crate) async fn find_any(
    executor: impl SqliteExecutor<'_>,
    hostname: &str,
) -> sqlx::Result<Option<ExtraHostname>> {
    sqlx::query_as::<_, ExtraHostname>(&format!(
        "SELECT {COLUMNS} FROM extra_hostnames WHERE hostname = ?"
    ))
    .bind(hostname)
    .fetch_optional(executor)
    .await
}

/// Returns `true` if `hostname` is an active extra hostname of any application.
pub(crate) async fn is_active_anywhere(
    executor: impl SqliteExecutor<'_>,
    hostname: &str,
) -> sqlx::Result<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM extra_hostnames WHERE hostname = ? AND deleted_at IS NULL)",
    )
    .bind(hostname)
    .fetch_one(executor)
    .await
}

pub(crate) async fn insert(
    executor: impl SqliteExecutor<'_>,
    application_id: i64,
    hostname: &str,
) -> sqlx::Result<ExtraHostname> {
    sqlx::query_as::<_, ExtraHostname>(&format!(
        "INSERT INTO extra_hostnames (application_id, hostname, created_at) VALUES (?, ?, ?) \
         RETURNING {COLUMNS}"
    ))
    .bind(application_id)
    .bind(hostname)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

/// Clears the soft-delete marker and binds the row to `application_id`.
pub(crate) async fn restore(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    application_id: i64,
) -> sqlx::Result<ExtraHostname> {
    sqlx::query_as::<_, ExtraHostname>(&format!(
        "UPDATE extra_hostnames SET deleted_at = NULL, application_id = ? \
         WHERE id = ? AND deleted_at IS NOT NULL RETURNING {COLUMNS}"
    ))
    .bind(application_id)
    .bind(id)
    .fetch_one(executor)
    .await
}

/// Soft-deletes an active hostname of `application_id`. Returns `false` if there was none.
pub(crate) async fn soft_delete(
    executor: impl SqliteExecutor<'_>,
    application_id: i64,
    hostname: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE extra_hostnames SET deleted_at = ? \
         WHERE application_id = ? AND hostname = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(application_id)
    .bind(hostname)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn list_active(
    executor: impl SqliteExecutor<'_>,
    application_id: i64,
) -> sqlx::Result<Vec<ExtraHostname>> {
    sqlx::query_as::<_, ExtraHostname>(&format!(
        "SELECT {COLUMNS} FROM extra_hostnames \
         WHERE application_id = ? AND deleted_at IS NULL ORDER BY id"
    ))
    .bind(application_id)
    .fetch_all(executor)
    .await
}
