//! PR-specific cached data: details, reviews, review comments, changed files
//!
//! These tables are refresh-replaced, not patched: a PR detail fetch
//! deletes the previous rows and reinserts inside one transaction so
//! readers never observe a half-refreshed PR.

use crate::Result;
use sqlx::SqlitePool;

/// Cached PR metadata, one row per notification
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PrDetails {
    pub notification_id: String,
    pub pr_number: i64,
    pub author: String,
    pub body: Option<String>,
    pub labels_json: String,
    pub base_ref: Option<String>,
    pub head_ref: Option<String>,
    pub loaded_at: String,
}

/// A review grouping zero or more threaded review comments
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PrReview {
    pub review_id: String,
    pub notification_id: String,
    pub author: String,
    pub state: String,
    pub body: String,
    pub submitted_at: Option<String>,
}

/// A review comment; all comments in a thread share is_resolved
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ReviewComment {
    pub comment_id: String,
    pub review_id: Option<String>,
    pub notification_id: String,
    pub thread_id: Option<String>,
    pub author: String,
    pub body: String,
    pub path: Option<String>,
    pub diff_hunk: Option<String>,
    pub line: Option<i64>,
    pub side: Option<String>,
    pub in_reply_to_id: Option<String>,
    pub is_resolved: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One changed file in a PR; patch is NULL for binary/oversized files
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PrFile {
    pub file_id: i64,
    pub notification_id: String,
    pub filename: String,
    pub status: String,
    pub additions: i64,
    pub deletions: i64,
    pub patch: Option<String>,
}

/// Input shape for `replace_pr_files` (file_id is assigned by SQLite)
#[derive(Debug, Clone)]
pub struct NewPrFile {
    pub filename: String,
    pub status: String,
    pub additions: i64,
    pub deletions: i64,
    pub patch: Option<String>,
}

/// Insert or update cached PR details
pub async fn upsert_pr_details(
    pool: &SqlitePool,
    notification_id: &str,
    pr_number: i64,
    author: &str,
    body: Option<&str>,
    labels_json: &str,
    base_ref: Option<&str>,
    head_ref: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pr_details
            (notification_id, pr_number, author, body, labels_json, base_ref, head_ref)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(notification_id) DO UPDATE SET
            pr_number = excluded.pr_number,
            author = excluded.author,
            body = excluded.body,
            labels_json = excluded.labels_json,
            base_ref = excluded.base_ref,
            head_ref = excluded.head_ref,
            loaded_at = datetime('now')
        "#,
    )
    .bind(notification_id)
    .bind(pr_number)
    .bind(author)
    .bind(body)
    .bind(labels_json)
    .bind(base_ref)
    .bind(head_ref)
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert or update PR reviews
pub async fn upsert_pr_reviews(pool: &SqlitePool, reviews: &[PrReview]) -> Result<()> {
    for review in reviews {
        sqlx::query(
            r#"
            INSERT INTO pr_reviews
                (review_id, notification_id, author, state, body, submitted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(review_id) DO UPDATE SET
                state = excluded.state,
                body = excluded.body
            "#,
        )
        .bind(&review.review_id)
        .bind(&review.notification_id)
        .bind(&review.author)
        .bind(&review.state)
        .bind(&review.body)
        .bind(&review.submitted_at)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Insert or update review comments
pub async fn upsert_review_comments(pool: &SqlitePool, comments: &[ReviewComment]) -> Result<()> {
    for comment in comments {
        sqlx::query(
            r#"
            INSERT INTO review_comments
                (comment_id, review_id, notification_id, thread_id, author, body,
                 path, diff_hunk, line, side, in_reply_to_id, is_resolved,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(comment_id) DO UPDATE SET
                body = excluded.body,
                is_resolved = excluded.is_resolved,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&comment.comment_id)
        .bind(&comment.review_id)
        .bind(&comment.notification_id)
        .bind(&comment.thread_id)
        .bind(&comment.author)
        .bind(&comment.body)
        .bind(&comment.path)
        .bind(&comment.diff_hunk)
        .bind(comment.line)
        .bind(&comment.side)
        .bind(&comment.in_reply_to_id)
        .bind(comment.is_resolved)
        .bind(&comment.created_at)
        .bind(&comment.updated_at)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Replace all changed files for a notification in one transaction
pub async fn replace_pr_files(
    pool: &SqlitePool,
    notification_id: &str,
    files: &[NewPrFile],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM pr_files WHERE notification_id = ?")
        .bind(notification_id)
        .execute(&mut *tx)
        .await?;
    for file in files {
        sqlx::query(
            r#"
            INSERT INTO pr_files
                (notification_id, filename, status, additions, deletions, patch)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification_id)
        .bind(&file.filename)
        .bind(&file.status)
        .bind(file.additions)
        .bind(file.deletions)
        .bind(&file.patch)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Cached PR details, or None when never loaded
pub async fn get_pr_details(
    pool: &SqlitePool,
    notification_id: &str,
) -> Result<Option<PrDetails>> {
    let row = sqlx::query_as::<_, PrDetails>(
        "SELECT * FROM pr_details WHERE notification_id = ?",
    )
    .bind(notification_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Reviews for a notification, oldest first
pub async fn get_pr_reviews(pool: &SqlitePool, notification_id: &str) -> Result<Vec<PrReview>> {
    let rows = sqlx::query_as::<_, PrReview>(
        "SELECT * FROM pr_reviews WHERE notification_id = ? ORDER BY submitted_at",
    )
    .bind(notification_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Review comments for a notification, oldest first
pub async fn get_review_threads(
    pool: &SqlitePool,
    notification_id: &str,
) -> Result<Vec<ReviewComment>> {
    let rows = sqlx::query_as::<_, ReviewComment>(
        "SELECT * FROM review_comments WHERE notification_id = ? ORDER BY created_at",
    )
    .bind(notification_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Changed files for a notification, ordered by filename
pub async fn get_pr_files(pool: &SqlitePool, notification_id: &str) -> Result<Vec<PrFile>> {
    let rows = sqlx::query_as::<_, PrFile>(
        "SELECT * FROM pr_files WHERE notification_id = ? ORDER BY filename",
    )
    .bind(notification_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Invalidate all cached PR data for a notification in one transaction,
/// leaving the notification row itself untouched
pub async fn delete_pr_data(pool: &SqlitePool, notification_id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    for table in ["pr_files", "review_comments", "pr_reviews", "pr_details"] {
        let sql = format!("DELETE FROM {table} WHERE notification_id = ?");
        sqlx::query(&sql).bind(notification_id).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}
