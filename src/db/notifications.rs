//! Notification row model and queries

use crate::Result;
use sqlx::SqlitePool;

/// A cached GitHub notification
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Notification {
    pub notification_id: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub subject_type: String,
    pub subject_title: String,
    pub subject_url: Option<String>,
    pub html_url: Option<String>,
    pub reason: String,
    pub updated_at: String,
    pub unread: bool,
    pub priority_score: i64,
    pub priority_tier: String,
    pub raw_json: String,
    pub comments_loaded: bool,
    pub last_viewed_at: Option<String>,
    pub ci_status: Option<String>,
    pub subject_state: Option<String>,
}

impl Notification {
    /// `owner/name` shorthand used in filters and stats
    pub fn repo(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }
}

/// Lightweight projection for comment pre-loading
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationPreload {
    pub notification_id: String,
    pub raw_json: String,
    pub comments_loaded: bool,
}

/// A label + count pair for statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CountStat {
    pub label: String,
    pub count: i64,
}

/// Aggregate notification statistics
#[derive(Debug, Clone)]
pub struct NotificationStats {
    pub total: i64,
    pub by_tier: Vec<CountStat>,
    pub by_repo: Vec<CountStat>,
    pub by_reason: Vec<CountStat>,
}

/// Escape LIKE special characters so user text matches literally
fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Insert or update a notification.
///
/// Idempotent: re-applying the same row leaves identical stored state.
/// When the remote `updated_at` advanced, `comments_loaded` is cleared
/// so the next lazy load re-fetches (staleness implies re-fetch).
pub async fn upsert_notification(pool: &SqlitePool, row: &Notification) -> Result<()> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT updated_at FROM notifications WHERE notification_id = ?")
            .bind(&row.notification_id)
            .fetch_optional(pool)
            .await?;

    match existing {
        None => {
            sqlx::query(
                r#"
                INSERT INTO notifications
                    (notification_id, repo_owner, repo_name, subject_type, subject_title,
                     subject_url, html_url, reason, updated_at, unread, priority_score,
                     priority_tier, raw_json, comments_loaded, last_viewed_at, ci_status,
                     subject_state)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.notification_id)
            .bind(&row.repo_owner)
            .bind(&row.repo_name)
            .bind(&row.subject_type)
            .bind(&row.subject_title)
            .bind(&row.subject_url)
            .bind(&row.html_url)
            .bind(&row.reason)
            .bind(&row.updated_at)
            .bind(row.unread)
            .bind(row.priority_score)
            .bind(&row.priority_tier)
            .bind(&row.raw_json)
            .bind(row.comments_loaded)
            .bind(&row.last_viewed_at)
            .bind(&row.ci_status)
            .bind(&row.subject_state)
            .execute(pool)
            .await?;
        }
        Some(stored_updated_at) => {
            let comments_loaded = if stored_updated_at != row.updated_at {
                false
            } else {
                row.comments_loaded
            };
            sqlx::query(
                r#"
                UPDATE notifications SET
                    repo_owner = ?, repo_name = ?, subject_type = ?, subject_title = ?,
                    subject_url = ?, html_url = ?, reason = ?, updated_at = ?, unread = ?,
                    priority_score = ?, priority_tier = ?, raw_json = ?,
                    comments_loaded = ?, ci_status = ?, subject_state = ?
                WHERE notification_id = ?
                "#,
            )
            .bind(&row.repo_owner)
            .bind(&row.repo_name)
            .bind(&row.subject_type)
            .bind(&row.subject_title)
            .bind(&row.subject_url)
            .bind(&row.html_url)
            .bind(&row.reason)
            .bind(&row.updated_at)
            .bind(row.unread)
            .bind(row.priority_score)
            .bind(&row.priority_tier)
            .bind(&row.raw_json)
            .bind(comments_loaded)
            .bind(&row.ci_status)
            .bind(&row.subject_state)
            .bind(&row.notification_id)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// Return a single notification by ID
pub async fn get_notification(
    pool: &SqlitePool,
    notification_id: &str,
) -> Result<Option<Notification>> {
    let row = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE notification_id = ?",
    )
    .bind(notification_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Total number of cached notifications
pub async fn notification_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM notifications")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Return notifications in display order, with optional filters.
///
/// Order is `priority_score DESC, updated_at DESC` so equal scores
/// break on recency. `filter_text` matches the title or `owner/name`
/// substring, LIKE-escaped; `filter_reason` matches exactly.
pub async fn list_notifications(
    pool: &SqlitePool,
    filter_text: &str,
    filter_reason: &str,
) -> Result<Vec<Notification>> {
    let mut query = String::from("SELECT * FROM notifications WHERE 1=1");
    let mut text_like: Option<String> = None;

    if !filter_text.is_empty() {
        query.push_str(
            " AND (subject_title LIKE ? ESCAPE '\\'
               OR repo_owner || '/' || repo_name LIKE ? ESCAPE '\\')",
        );
        text_like = Some(format!("%{}%", escape_like(filter_text)));
    }
    if !filter_reason.is_empty() {
        query.push_str(" AND reason = ?");
    }
    query.push_str(" ORDER BY priority_score DESC, updated_at DESC");

    let mut q = sqlx::query_as::<_, Notification>(&query);
    if let Some(like) = &text_like {
        q = q.bind(like).bind(like);
    }
    if !filter_reason.is_empty() {
        q = q.bind(filter_reason);
    }
    Ok(q.fetch_all(pool).await?)
}

/// Top-N notifications by priority for comment pre-loading
pub async fn top_for_preload(pool: &SqlitePool, limit: i64) -> Result<Vec<NotificationPreload>> {
    let rows = sqlx::query_as::<_, NotificationPreload>(
        "SELECT notification_id, raw_json, comments_loaded FROM notifications
         ORDER BY priority_score DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Set comments_loaded for a notification
pub async fn mark_comments_loaded(pool: &SqlitePool, notification_id: &str) -> Result<()> {
    sqlx::query("UPDATE notifications SET comments_loaded = 1 WHERE notification_id = ?")
        .bind(notification_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record that the user viewed a notification just now
pub async fn touch_last_viewed(pool: &SqlitePool, notification_id: &str) -> Result<()> {
    sqlx::query(
        "UPDATE notifications SET last_viewed_at = datetime('now') WHERE notification_id = ?",
    )
    .bind(notification_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Notification IDs matching a reason
pub async fn notification_ids_by_reason(pool: &SqlitePool, reason: &str) -> Result<Vec<String>> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT notification_id FROM notifications WHERE reason = ?")
            .bind(reason)
            .fetch_all(pool)
            .await?;
    Ok(ids)
}

/// Notification IDs matching owner/repo and issue/PR number
pub async fn notification_ids_by_ref(
    pool: &SqlitePool,
    owner: &str,
    repo: &str,
    number: i64,
) -> Result<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT notification_id FROM notifications
         WHERE repo_owner = ? AND repo_name = ? AND subject_url LIKE ?",
    )
    .bind(owner)
    .bind(repo)
    .bind(format!("%/{number}"))
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Delete a notification; comments and PR data go with it via CASCADE
pub async fn delete_notification(pool: &SqlitePool, notification_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM notifications WHERE notification_id = ?")
        .bind(notification_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete all notifications. Returns how many were deleted.
pub async fn purge_all(pool: &SqlitePool) -> Result<i64> {
    let result = sqlx::query("DELETE FROM notifications").execute(pool).await?;
    Ok(result.rows_affected() as i64)
}

/// Delete notifications absent from the latest fetch window.
///
/// A cached notification is purged iff its ID is not in `keep_ids` and
/// its updated_at is <= `oldest_updated_at` (the oldest timestamp the
/// fetch actually covered). Anything newer than the window is retained:
/// an incremental fetch legitimately omits unchanged items.
pub async fn purge_stale(
    pool: &SqlitePool,
    keep_ids: &[String],
    oldest_updated_at: &str,
) -> Result<i64> {
    let placeholders = vec!["?"; keep_ids.len()].join(",");
    let sql = format!(
        "DELETE FROM notifications WHERE notification_id NOT IN ({placeholders})
         AND updated_at <= ?"
    );
    let mut q = sqlx::query(&sql);
    for id in keep_ids {
        q = q.bind(id);
    }
    q = q.bind(oldest_updated_at);
    let result = q.execute(pool).await?;
    Ok(result.rows_affected() as i64)
}

/// Aggregate counts by tier, repo, and reason
pub async fn notification_stats(pool: &SqlitePool) -> Result<NotificationStats> {
    let total = notification_count(pool).await?;
    let by_tier = sqlx::query_as::<_, (String, i64)>(
        "SELECT priority_tier, count(*) as cnt FROM notifications
         GROUP BY priority_tier ORDER BY cnt DESC",
    )
    .fetch_all(pool)
    .await?;
    let by_repo = sqlx::query_as::<_, (String, i64)>(
        "SELECT repo_owner || '/' || repo_name as repo, count(*) as cnt
         FROM notifications GROUP BY repo ORDER BY cnt DESC",
    )
    .fetch_all(pool)
    .await?;
    let by_reason = sqlx::query_as::<_, (String, i64)>(
        "SELECT reason, count(*) as cnt FROM notifications GROUP BY reason ORDER BY cnt DESC",
    )
    .fetch_all(pool)
    .await?;

    let to_stats = |rows: Vec<(String, i64)>| {
        rows.into_iter()
            .map(|(label, count)| CountStat { label, count })
            .collect()
    };
    Ok(NotificationStats {
        total,
        by_tier: to_stats(by_tier),
        by_repo: to_stats(by_repo),
        by_reason: to_stats(by_reason),
    })
}
