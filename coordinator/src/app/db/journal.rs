use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub(crate) enum StepOutcome {
    Completed,
    Failed,
}

/// One recorded step of a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub(crate) struct JournalEntry {
    pub id: i64,
    pub application_id: i64,
    pub application_name: String,
    pub operation: String,
    pub stage: String,
    pub outcome: StepOutcome,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub(crate) struct NewJournalEntry<'a> {
    pub application_id: i64,
    pub application_name: &'a str,
    pub operation: &'a str,
    pub stage: &'a str,
    pub outcome: StepOutcome,
    pub detail: Option<&'a str>,
}

pub(crate) async fn append(
    executor: impl SqliteExecutor<'_>,
    entry: &NewJournalEntry<'_>,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO lifecycle_journal \
         (application_id, application_name, operation, stage, outcome, detail, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.application_id)
    .bind(entry.application_name)
    .bind(entry.operation)
    .bind(entry.stage)
    .bind(entry.outcome)
    .bind(entry.detail)
    .bind(Utc::now())
    .execute(executor)
    .await?;
    Ok(())
}

/// In the order the steps were recorded.
pub(crate) async fn list_for_application(
    executor: impl SqliteExecutor<'_>,
    application_id: i64,
) -> sqlx::Result<Vec<JournalEntry>> {
    sqlx::query_as::<_, JournalEntry>(
        "SELECT id, application_id, application_name, operation, stage, outcome, detail, created_at \
         FROM lifecycle_journal WHERE application_id = ? ORDER BY id",
    )
    .bind(application_id)
    .fetch_all(executor)
    .await
}
