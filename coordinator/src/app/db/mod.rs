//! Control plane persistence on `SQLite`.
//!
//! Query functions take any `SQLite` executor so the same code runs against the pool or inside
//! a transaction (`&mut *tx`).

pub(crate) mod applications;
pub(crate) mod hostnames;
pub(crate) mod journal;
pub(crate) mod notifications;
pub(crate) mod subscriptions;
pub(crate) mod users;

use core::{str::FromStr as _, time::Duration};
use std::path::Path;

use eyre::WrapErr as _;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

pub(crate) type DbPool = SqlitePool;

pub(crate) use applications::{Application, ApplicationStatus, NewApplication};
pub(crate) use hostnames::ExtraHostname;
pub(crate) use journal::{JournalEntry, StepOutcome};
pub(crate) use notifications::Notification;
pub(crate) use subscriptions::{NewSubscription, Subscription};
pub(crate) use users::User;

/// Opens (creating if missing) the database at `path` and applies pending migrations.
///
/// `:memory:` opens a private in-memory database on a single connection.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or a migration fails.
pub(crate) async fn init(path: &Path) -> eyre::Result<DbPool> {
    let in_memory = path.as_os_str() == ":memory:";
    let options = if in_memory {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
    }
    .foreign_keys(true)
    .busy_timeout(Duration::from_secs(30));

    // Every connection of an in-memory database would see its own empty database, and closing
    // the last one loses it.
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(8)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .wrap_err("Failed to open SQLite database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .wrap_err("Failed to run database migrations")?;

    Ok(pool)
}

#[cfg(test)]
pub(crate) mod test_support {
    use core::sync::atomic::{AtomicU32, Ordering};
    use std::{env, fs, path::PathBuf, process};

    use super::{DbPool, init};

    static NEXT_DB: AtomicU32 = AtomicU32::new(0);

    /// A database file in the temp dir, removed on drop.
    pub(crate) struct TestDb {
        pub pool: DbPool,
        path: PathBuf,
    }

    impl TestDb {
        pub(crate) async fn new() -> Self {
            let n = NEXT_DB.fetch_add(1, Ordering::Relaxed);
            let path = env::temp_dir().join(format!("hostplane_test_{}_{n}.db", process::id()));
            drop(fs::remove_file(&path));
            let pool = init(&path).await.expect("failed to initialize test database");
            Self { pool, path }
        }
    }

    impl Drop for TestDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut file = self.path.clone().into_os_string();
                file.push(suffix);
                drop(fs::remove_file(file));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_database_is_migrated() {
        let pool = init(Path::new(":memory:")).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
