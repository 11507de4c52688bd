use chrono::{DateTime, Utc};
use hostplane_common::ApplicationName;
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub(crate) struct Application {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub name: ApplicationName,
    pub git_url: String,
    pub branch: String,
    pub port: u16,
    pub description: String,
    pub status: ApplicationStatus,
    pub owner_id: i64,
    pub primary_hostname: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) struct NewApplication<'a> {
    pub name: &'a ApplicationName,
    pub git_url: &'a str,
    pub branch: &'a str,
    pub port: u16,
    pub description: &'a str,
    pub owner_id: i64,
    pub primary_hostname: &'a str,
}

const COLUMNS: &str =
    "id, name, git_url, branch, port, description, status, owner_id, primary_hostname, created_at";

pub(crate) async fn insert(
    executor: impl SqliteExecutor<'_>,
    new: &NewApplication<'_>,
) -> sqlx::Result<Application> {
    sqlx::query_as::<_, Application>(&format!(
        "INSERT INTO applications \
         (name, git_url, branch, port, description, status, owner_id, primary_hostname, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    ))
    .bind(new.name.as_str())
    .bind(new.git_url)
    .bind(new.branch)
    .bind(new.port)
    .bind(new.description)
    .bind(ApplicationStatus::Pending)
    .bind(new.owner_id)
    .bind(new.primary_hostname)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

pub(crate) async fn find(
    executor: impl SqliteExecutor<'_>,
    id: i64,
) -> sqlx::Result<Option<Application>> {
    sqlx::query_as::<_, Application>(&format!("SELECT {COLUMNS} FROM applications WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn name_exists(
    executor: impl SqliteExecutor<'_>,
    name: &ApplicationName,
) -> sqlx::Result<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM applications WHERE name = ?)")
        .bind(name.as_str())
        .fetch_one(executor)
        .await
}

/// Returns the id of the application using `hostname` as its primary hostname.
pub(crate) async fn find_by_primary_hostname(
    executor: impl SqliteExecutor<'_>,
    hostname: &str,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM applications WHERE primary_hostname = ?")
        .bind(hostname)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_by_owner(
    executor: impl SqliteExecutor<'_>,
    owner_id: i64,
) -> sqlx::Result<Vec<Application>> {
    sqlx::query_as::<_, Application>(&format!(
        "SELECT {COLUMNS} FROM applications WHERE owner_id = ? ORDER BY id"
    ))
    .bind(owner_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list(executor: impl SqliteExecutor<'_>) -> sqlx::Result<Vec<Application>> {
    sqlx::query_as::<_, Application>(&format!("SELECT {COLUMNS} FROM applications ORDER BY id"))
        .fetch_all(executor)
        .await
}

/// Moves an application from `from` to `to`. Returns `false` if it was not in `from`.
pub(crate) async fn transition_status(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE applications SET status = ? WHERE id = ? AND status = ?")
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn set_primary_hostname(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    hostname: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE applications SET primary_hostname = ? WHERE id = ?")
        .bind(hostname)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Deletes the application; its extra hostnames go with it.
pub(crate) async fn delete(executor: impl SqliteExecutor<'_>, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM applications WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}
