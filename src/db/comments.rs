//! Comment row model and queries
//!
//! Comments are owned by their notification and cascade-deleted with it.

use crate::Result;
use sqlx::SqlitePool;

/// A flat issue/PR comment attached to a notification
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Comment {
    pub comment_id: String,
    pub notification_id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Insert or update comments; conflicts refresh body and updated_at
pub async fn upsert_comments(pool: &SqlitePool, comments: &[Comment]) -> Result<()> {
    for comment in comments {
        sqlx::query(
            r#"
            INSERT INTO comments
                (comment_id, notification_id, author, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(comment_id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&comment.comment_id)
        .bind(&comment.notification_id)
        .bind(&comment.author)
        .bind(&comment.body)
        .bind(&comment.created_at)
        .bind(&comment.updated_at)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Comments for a notification, oldest first
pub async fn get_comments(pool: &SqlitePool, notification_id: &str) -> Result<Vec<Comment>> {
    let rows = sqlx::query_as::<_, Comment>(
        "SELECT * FROM comments WHERE notification_id = ? ORDER BY created_at",
    )
    .bind(notification_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
