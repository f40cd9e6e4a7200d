//! Database access layer
//!
//! SQLite cache for notifications and their secondary data (comments,
//! PR details, reviews, changed files). The cache is disposable:
//! deleting the file and re-syncing rebuilds everything from GitHub.
//!
//! WAL journal mode lets the front end run read queries while the
//! worker holds a write transaction.

pub mod comments;
pub mod migrations;
pub mod notifications;
pub mod pr;
pub mod schema;

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Create or open the database at `path` and ensure the schema exists.
///
/// Fresh databases get the full up-to-date schema and are stamped at
/// the latest version; existing databases have pending migrations
/// applied in order.
pub async fn open_db(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        // raw_json can embed auth-adjacent data; keep the directory private
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
        .map_err(sqlx::Error::from)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options).await?;
    schema::create_schema(&pool).await?;
    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

/// Create an in-memory database with the full schema applied (for tests)
pub async fn open_memory_db() -> Result<SqlitePool> {
    // A single connection so every query sees the same in-memory database
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(sqlx::Error::from)?
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    schema::create_schema(&pool).await?;
    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

/// Read a sync_metadata value (`last_sync_at`, `schema_version`, ...)
pub async fn get_sync_meta(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM sync_metadata WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Write a sync_metadata value, replacing any previous one
pub async fn set_sync_meta(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO sync_metadata (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_db_is_stamped_at_latest_version() {
        let pool = open_memory_db().await.unwrap();
        let version = migrations::get_schema_version(&pool).await.unwrap();
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn sync_meta_round_trip() {
        let pool = open_memory_db().await.unwrap();
        assert_eq!(get_sync_meta(&pool, "last_sync_at").await.unwrap(), None);

        set_sync_meta(&pool, "last_sync_at", "2026-02-09T07:00:00Z")
            .await
            .unwrap();
        assert_eq!(
            get_sync_meta(&pool, "last_sync_at").await.unwrap().as_deref(),
            Some("2026-02-09T07:00:00Z")
        );

        set_sync_meta(&pool, "last_sync_at", "2026-02-10T07:00:00Z")
            .await
            .unwrap();
        assert_eq!(
            get_sync_meta(&pool, "last_sync_at").await.unwrap().as_deref(),
            Some("2026-02-10T07:00:00Z")
        );
    }

    #[tokio::test]
    async fn migrations_upgrade_a_version_zero_db_in_order() {
        // Simulate a legacy database: full current schema minus the
        // subject_state column and with a row, no version stamp.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        schema::create_schema(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO notifications
             (notification_id, repo_owner, repo_name, subject_type, subject_title,
              reason, updated_at, raw_json)
             VALUES ('1', 'o', 'r', 'Issue', 't', 'mention', '2026-01-01T00:00:00Z', '{}')",
        )
        .execute(&pool)
        .await
        .unwrap();

        migrations::run_migrations(&pool).await.unwrap();
        assert_eq!(
            migrations::get_schema_version(&pool).await.unwrap(),
            migrations::LATEST_SCHEMA_VERSION
        );

        // v2 recreated review_comments; the data row survived
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM notifications")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
