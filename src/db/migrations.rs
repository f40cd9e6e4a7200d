//! Versioned schema migrations
//!
//! Migrations upgrade databases created by older releases without data
//! loss. The version lives in `sync_metadata` under `schema_version`
//! (absent means version 0). Rules:
//!
//! 1. Never modify an existing migration; add a new one.
//! 2. Migrations apply strictly in ascending order, no skipping.
//! 3. Each migration is idempotent (safe to re-run after a crash).
//! 4. Fresh databases already have the full schema from CREATE TABLE,
//!    so they are stamped at the latest version without running any
//!    ALTER statements.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Latest schema version
///
/// Increment when adding a migration.
pub const LATEST_SCHEMA_VERSION: i64 = 2;

/// Read the stored schema version (0 for databases that predate versioning)
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i64> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM sync_metadata WHERE key = 'schema_version'")
            .fetch_optional(pool)
            .await?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO sync_metadata (key, value) VALUES ('schema_version', ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(version.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// A database with no version stamp and no rows is freshly created
async fn is_fresh_db(pool: &SqlitePool) -> Result<bool> {
    let stamped: Option<String> =
        sqlx::query_scalar("SELECT value FROM sync_metadata WHERE key = 'schema_version'")
            .fetch_optional(pool)
            .await?;
    if stamped.is_some() {
        return Ok(false);
    }
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM notifications")
        .fetch_one(pool)
        .await?;
    Ok(count == 0)
}

/// Apply pending migrations, or stamp fresh databases at the latest version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    if is_fresh_db(pool).await? {
        set_schema_version(pool, LATEST_SCHEMA_VERSION).await?;
        return Ok(());
    }

    let mut current = get_schema_version(pool).await?;

    if current < 1 {
        migrate_v1(pool).await?;
        current = 1;
        set_schema_version(pool, current).await?;
    }
    if current < 2 {
        migrate_v2(pool).await?;
        current = 2;
        set_schema_version(pool, current).await?;
    }

    Ok(())
}

/// v1: add `subject_state` to notifications
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM pragma_table_info('notifications') WHERE name = 'subject_state'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        sqlx::query("ALTER TABLE notifications ADD COLUMN subject_state TEXT")
            .execute(pool)
            .await?;
        info!("Migration v1: added subject_state to notifications");
    }
    Ok(())
}

/// v2: rebuild review_comments with a nullable review_id
///
/// The column was NOT NULL, which violated the foreign key for thread
/// comments whose parent review is unknown. SQLite cannot alter column
/// constraints, so the table is recreated. The data is a cache and gets
/// re-fetched on the next PR detail load.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS review_comments")
        .execute(pool)
        .await?;
    sqlx::query(
        r#"
        CREATE TABLE review_comments (
            comment_id      TEXT PRIMARY KEY,
            review_id       TEXT REFERENCES pr_reviews(review_id) ON DELETE CASCADE,
            notification_id TEXT NOT NULL
                REFERENCES notifications(notification_id) ON DELETE CASCADE,
            thread_id       TEXT,
            author          TEXT NOT NULL,
            body            TEXT NOT NULL,
            path            TEXT,
            diff_hunk       TEXT,
            line            INTEGER,
            side            TEXT,
            in_reply_to_id  TEXT,
            is_resolved     INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_review_comments_notification
             ON review_comments(notification_id, created_at)",
    )
    .execute(pool)
    .await?;
    info!("Migration v2: rebuilt review_comments with nullable review_id");
    Ok(())
}
