//! Sync orchestration — one forward pass from GitHub into the cache
//!
//! Stage order: LIST → BATCH_ENRICH → UPSERT → PURGE → PRELOAD →
//! COMMIT_META. Stages degrade rather than abort: a rate limit stops
//! further fetching but keeps everything already committed, and a
//! failed comment pre-load never fails the sync. Only auth and
//! database errors abort the pass.

use crate::config::Config;
use crate::db::{self, notifications};
use crate::github::{comments_url_from_subject, GithubApi, RemoteNotification, SubjectDetails};
use crate::priority::compute_priority;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Summary of one sync pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSummary {
    pub new: i64,
    pub updated: i64,
    pub purged: i64,
    pub total: i64,
    /// Set when the pass stopped fetching early on a rate limit
    pub rate_limited_until: Option<DateTime<Utc>>,
}

/// Progress callback: (items processed, items total)
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Build the cache row for one fetched notification
fn notification_row(
    notif: &RemoteNotification,
    details: Option<&SubjectDetails>,
) -> notifications::Notification {
    let (subject_state, ci_status) = match details {
        Some((state, ci)) => (*state, *ci),
        None => (None, None),
    };
    // Viewer identity is not resolved yet, so is_own_pr is always false
    // here; the rule is still wired through the priority engine.
    let (score, tier) = compute_priority(&notif.reason, ci_status, false);

    notifications::Notification {
        notification_id: notif.id.clone(),
        repo_owner: notif.repo_owner.clone(),
        repo_name: notif.repo_name.clone(),
        subject_type: notif.subject_type.as_str().to_string(),
        subject_title: notif.subject_title.clone(),
        subject_url: notif.subject_url.clone(),
        html_url: notif.html_url(),
        reason: notif.reason.clone(),
        updated_at: notif.updated_at.clone(),
        unread: notif.unread,
        priority_score: score,
        priority_tier: tier.as_str().to_string(),
        raw_json: notif.raw.to_string(),
        comments_loaded: false,
        last_viewed_at: None,
        ci_status: ci_status.map(|c| c.as_str().to_string()),
        subject_state: subject_state.map(|s| s.as_str()).map(str::to_string),
    }
}

/// Delete cached notifications the fetch proved gone.
///
/// An empty fetch means the upstream inbox is empty, so everything is
/// purged. Otherwise only items inside the fetched time window (their
/// updated_at at or before the oldest fetched timestamp) and absent
/// from the fetched set are deleted; newer items outside the window may
/// simply have been omitted by an incremental fetch.
async fn purge_stale(pool: &SqlitePool, fetched: &[RemoteNotification]) -> Result<i64> {
    if fetched.is_empty() {
        return notifications::purge_all(pool).await;
    }
    let keep_ids: Vec<String> = fetched.iter().map(|n| n.id.clone()).collect();
    let oldest = fetched
        .iter()
        .map(|n| n.updated_at.as_str())
        .min()
        .expect("fetched is non-empty");
    notifications::purge_stale(pool, &keep_ids, oldest).await
}

/// Pre-load comments for the top-N notifications by priority whose
/// comments are not yet cached. At most `concurrency` fetches run at
/// once; per-item failures are logged and skipped. Returns the IDs
/// that were loaded.
pub async fn preload_comments(
    pool: &SqlitePool,
    api: &dyn GithubApi,
    top_n: usize,
    concurrency: usize,
) -> Result<Vec<String>> {
    let rows = notifications::top_for_preload(pool, top_n as i64).await?;
    let semaphore = Semaphore::new(concurrency);

    let tasks = rows
        .iter()
        .filter(|row| !row.comments_loaded)
        .map(|row| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                match preload_one(pool, api, &row.notification_id, &row.raw_json).await {
                    Ok(loaded) => loaded.then(|| row.notification_id.clone()),
                    Err(e) => {
                        warn!(
                            notification_id = %row.notification_id,
                            error = %e,
                            "Comment pre-load failed"
                        );
                        None
                    }
                }
            }
        });

    let loaded: Vec<String> = join_all(tasks).await.into_iter().flatten().collect();
    Ok(loaded)
}

/// Fetch and cache comments for one notification. Returns false when
/// the subject has no comments endpoint (releases, CI runs, ...).
async fn preload_one(
    pool: &SqlitePool,
    api: &dyn GithubApi,
    notification_id: &str,
    raw_json: &str,
) -> Result<bool> {
    let raw: serde_json::Value = serde_json::from_str(raw_json)
        .map_err(|e| Error::InvalidInput(format!("corrupt raw_json for {notification_id}: {e}")))?;
    let subject_url = raw
        .get("subject")
        .and_then(|s| s.get("url"))
        .and_then(serde_json::Value::as_str);
    let Some(url) = comments_url_from_subject(subject_url) else {
        return Ok(false);
    };

    let fetched = api.fetch_comments(&url).await?;
    let rows: Vec<crate::db::comments::Comment> = fetched
        .into_iter()
        .map(|c| crate::db::comments::Comment {
            comment_id: c.id,
            notification_id: notification_id.to_string(),
            author: c.author,
            body: c.body,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect();
    crate::db::comments::upsert_comments(pool, &rows).await?;
    notifications::mark_comments_loaded(pool, notification_id).await?;
    Ok(true)
}

/// Run one full sync pass and return the summary.
///
/// A rate limit hit during LIST returns immediately with nothing
/// changed; during BATCH_ENRICH the pass continues with unknown states
/// for the unresolved items and skips the pre-load (the listing itself
/// completed, so the sync cursor still advances).
pub async fn sync(
    pool: &SqlitePool,
    api: &dyn GithubApi,
    config: &Config,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<SyncSummary> {
    let since = db::get_sync_meta(pool, "last_sync_at").await?;

    // LIST
    let mut fetched = match api.fetch_notifications(since.as_deref()).await {
        Ok(fetched) => fetched,
        Err(Error::RateLimited { reset }) => {
            warn!(?reset, "Rate limited while listing notifications; nothing synced");
            return Ok(SyncSummary {
                total: notifications::notification_count(pool).await?,
                rate_limited_until: reset.or_else(|| Some(Utc::now())),
                ..SyncSummary::default()
            });
        }
        Err(e) => return Err(e),
    };
    fetched.truncate(config.max_notifications);

    // BATCH_ENRICH
    let mut rate_limited_until = None;
    let details: HashMap<String, SubjectDetails> = match api.fetch_subject_details(&fetched).await {
        Ok(details) => details,
        Err(Error::RateLimited { reset }) => {
            warn!(?reset, "Rate limited during subject enrichment; storing unknown states");
            rate_limited_until = reset.or_else(|| Some(Utc::now()));
            HashMap::new()
        }
        Err(e) => return Err(e),
    };

    // UPSERT
    let mut new_count = 0;
    let mut updated_count = 0;
    let total_to_process = fetched.len();
    for (idx, notif) in fetched.iter().enumerate() {
        let row = notification_row(notif, details.get(&notif.id));

        let existing = notifications::get_notification(pool, &notif.id).await?;
        match existing {
            None => new_count += 1,
            Some(stored) if stored.updated_at != notif.updated_at => updated_count += 1,
            Some(_) => {}
        }
        notifications::upsert_notification(pool, &row).await?;

        if let Some(progress) = on_progress {
            progress(idx + 1, total_to_process);
        }
    }

    // PURGE
    let purged = purge_stale(pool, &fetched).await?;

    // PRELOAD (skipped when enrichment already hit the limit)
    if rate_limited_until.is_none() {
        match preload_comments(pool, api, config.preload_count, config.comment_concurrency).await {
            Ok(loaded) => {
                if !loaded.is_empty() {
                    info!(count = loaded.len(), "Pre-loaded comments");
                }
            }
            Err(Error::RateLimited { reset }) => {
                rate_limited_until = reset.or_else(|| Some(Utc::now()));
            }
            Err(e) => warn!(error = %e, "Comment pre-load pass failed"),
        }
    }

    // COMMIT_META
    if let Some(latest) = fetched.iter().map(|n| n.updated_at.as_str()).max() {
        db::set_sync_meta(pool, "last_sync_at", latest).await?;
    }

    let total = notifications::notification_count(pool).await?;
    info!(new = new_count, updated = updated_count, purged, total, "Sync complete");
    Ok(SyncSummary {
        new: new_count,
        updated: updated_count,
        purged,
        total,
        rate_limited_until,
    })
}
