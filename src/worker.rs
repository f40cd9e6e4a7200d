//! Background worker — the single owner of network and cache-write I/O
//!
//! One task consumes requests strictly in submission order and posts
//! one response per request. The front end holds a `WorkerHandle`:
//! `submit` is fire-and-forget, `try_recv`/`drain` poll completed
//! responses without blocking. Errors never cross the channel as
//! anything but `Response::Error`.

use crate::config::Config;
use crate::db::{comments, notifications, pr};
use crate::github::pr::ReviewEvent;
use crate::github::{comments_url_from_subject, parse_subject_url, GithubApi, PrRef};
use crate::messages::{Request, Response};
use crate::sync;
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Front-end side of the message bus
pub struct WorkerHandle {
    request_tx: mpsc::UnboundedSender<Request>,
    response_rx: mpsc::UnboundedReceiver<Response>,
}

impl WorkerHandle {
    /// Submit a request; never blocks. Returns an error only if the
    /// worker task is gone.
    pub fn submit(&self, request: Request) -> Result<()> {
        self.request_tx
            .send(request)
            .map_err(|_| Error::InvalidInput("worker has shut down".to_string()))
    }

    /// Poll one completed response without blocking
    pub fn try_recv(&mut self) -> Option<Response> {
        self.response_rx.try_recv().ok()
    }

    /// Drain all completed responses without blocking
    pub fn drain(&mut self) -> Vec<Response> {
        let mut responses = Vec::new();
        while let Some(response) = self.try_recv() {
            responses.push(response);
        }
        responses
    }

    /// Await the next response. For callers (CLI, tests) that have
    /// nothing else to do; the interactive front end polls instead.
    pub async fn recv(&mut self) -> Option<Response> {
        self.response_rx.recv().await
    }

    /// Closing the request channel lets the worker loop finish
    pub fn shutdown(self) {
        drop(self.request_tx);
    }
}

/// The worker task state: sole writer to the cache, sole network caller
pub struct Worker {
    pool: SqlitePool,
    api: Arc<dyn GithubApi>,
    config: Config,
}

impl Worker {
    /// Spawn the worker task and return the front end's handle
    pub fn spawn(pool: SqlitePool, api: Arc<dyn GithubApi>, config: Config) -> (WorkerHandle, JoinHandle<()>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let worker = Worker { pool, api, config };
        let join = tokio::spawn(worker.run(request_rx, response_tx));
        (WorkerHandle { request_tx, response_rx }, join)
    }

    /// Process requests in arrival order until the handle is dropped
    async fn run(
        self,
        mut request_rx: mpsc::UnboundedReceiver<Request>,
        response_tx: mpsc::UnboundedSender<Response>,
    ) {
        while let Some(request) = request_rx.recv().await {
            let name = request.name();
            debug!(request = name, "Worker processing request");
            let response = match self.handle(request).await {
                Ok(response) => response,
                Err(e) => {
                    error!(request = name, error = %e, "Worker request failed");
                    Response::Error {
                        request: name.to_string(),
                        message: e.to_string(),
                    }
                }
            };
            if response_tx.send(response).is_err() {
                // Front end dropped its handle; nothing left to serve
                break;
            }
        }
    }

    async fn handle(&self, request: Request) -> Result<Response> {
        match request {
            Request::MarkDone { notification_ids } => self.mark_done(notification_ids).await,
            Request::FetchComments { notification_id } => {
                self.fetch_comments(notification_id).await
            }
            Request::PreloadComments { top_n } => {
                let loaded_ids = sync::preload_comments(
                    &self.pool,
                    self.api.as_ref(),
                    top_n,
                    self.config.comment_concurrency,
                )
                .await?;
                Ok(Response::PreloadComplete { loaded_ids })
            }
            Request::FetchPrDetail { notification_id } => {
                self.fetch_pr_detail(notification_id).await
            }
            Request::PostReviewReply { notification_id, comment_id, body } => {
                let pr_ref = self.pr_ref(&notification_id).await?;
                self.api
                    .post_review_reply(&pr_ref, comment_id, &body)
                    .await
                    .map_err(mutation_err)?;
                Ok(Response::PostReviewReply { notification_id })
            }
            Request::SubmitReview { notification_id, event, body } => {
                let pr_ref = self.pr_ref(&notification_id).await?;
                self.submit_review(&pr_ref, event, &body).await?;
                Ok(Response::SubmitReview { notification_id })
            }
            Request::ResolveThread { notification_id, thread_node_id, resolve } => {
                self.api
                    .set_thread_resolved(&thread_node_id, resolve)
                    .await
                    .map_err(mutation_err)?;
                Ok(Response::ResolveThread { notification_id })
            }
            Request::Sync => {
                let summary = sync::sync(&self.pool, self.api.as_ref(), &self.config, None).await?;
                Ok(Response::SyncComplete { summary })
            }
        }
    }

    /// Mark each notification as read upstream and delete it locally.
    /// Per-ID failures are collected, not fatal: the front end re-shows
    /// the items whose mark failed (optimistic-hide rollback).
    async fn mark_done(&self, notification_ids: Vec<String>) -> Result<Response> {
        let mut done_ids = Vec::new();
        let mut errors = Vec::new();
        for nid in notification_ids {
            match self.api.mark_as_read(&nid).await {
                Ok(()) => {
                    notifications::delete_notification(&self.pool, &nid).await?;
                    done_ids.push(nid);
                }
                Err(e) => errors.push(format!("{nid}: {e}")),
            }
        }
        Ok(Response::MarkDone { notification_ids: done_ids, errors })
    }

    async fn fetch_comments(&self, notification_id: String) -> Result<Response> {
        let Some(notif) = notifications::get_notification(&self.pool, &notification_id).await?
        else {
            return Ok(Response::FetchComments { notification_id, comment_count: 0 });
        };
        let Some(url) = comments_url_from_subject(notif.subject_url.as_deref()) else {
            return Ok(Response::FetchComments { notification_id, comment_count: 0 });
        };

        let fetched = self.api.fetch_comments(&url).await?;
        let rows: Vec<comments::Comment> = fetched
            .into_iter()
            .map(|c| comments::Comment {
                comment_id: c.id,
                notification_id: notification_id.clone(),
                author: c.author,
                body: c.body,
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
            .collect();
        comments::upsert_comments(&self.pool, &rows).await?;
        notifications::mark_comments_loaded(&self.pool, &notification_id).await?;
        Ok(Response::FetchComments { notification_id, comment_count: rows.len() })
    }

    /// Refresh all cached PR data for a notification: invalidate, then
    /// fetch metadata, review threads, and changed files.
    async fn fetch_pr_detail(&self, notification_id: String) -> Result<Response> {
        let pr_ref = self.pr_ref(&notification_id).await?;

        // Stale rows go first so a fetch failure leaves an obviously
        // empty cache rather than a silently outdated one.
        pr::delete_pr_data(&self.pool, &notification_id).await?;

        let metadata = self.api.fetch_pr_metadata(&pr_ref).await?;
        pr::upsert_pr_details(
            &self.pool,
            &notification_id,
            metadata.pr_number,
            &metadata.author,
            metadata.body.as_deref(),
            &metadata.labels_json,
            metadata.base_ref.as_deref(),
            metadata.head_ref.as_deref(),
        )
        .await?;

        let (thread_comments, reviews) = self.api.fetch_review_threads(&pr_ref).await?;
        let review_rows: Vec<pr::PrReview> = reviews
            .into_iter()
            .map(|r| pr::PrReview {
                review_id: r.review_id,
                notification_id: notification_id.clone(),
                author: r.author,
                state: r.state,
                body: r.body,
                submitted_at: r.submitted_at,
            })
            .collect();
        pr::upsert_pr_reviews(&self.pool, &review_rows).await?;

        let comment_rows: Vec<pr::ReviewComment> = thread_comments
            .into_iter()
            .map(|c| pr::ReviewComment {
                comment_id: c.comment_id,
                review_id: None,
                notification_id: notification_id.clone(),
                thread_id: Some(c.thread_id),
                author: c.author,
                body: c.body,
                path: c.path,
                diff_hunk: c.diff_hunk,
                line: c.line,
                side: Some("RIGHT".to_string()),
                in_reply_to_id: None,
                is_resolved: c.is_resolved,
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
            .collect();
        pr::upsert_review_comments(&self.pool, &comment_rows).await?;

        let files = self.api.fetch_pr_files(&pr_ref).await?;
        let file_rows: Vec<pr::NewPrFile> = files
            .into_iter()
            .map(|f| pr::NewPrFile {
                filename: f.filename,
                status: f.status,
                additions: f.additions,
                deletions: f.deletions,
                patch: f.patch,
            })
            .collect();
        pr::replace_pr_files(&self.pool, &notification_id, &file_rows).await?;

        Ok(Response::FetchPrDetail { notification_id })
    }

    async fn submit_review(&self, pr_ref: &PrRef, event: ReviewEvent, body: &str) -> Result<()> {
        self.api.submit_review(pr_ref, event, body).await.map_err(mutation_err)
    }

    /// Resolve a notification's subject into a PR reference
    async fn pr_ref(&self, notification_id: &str) -> Result<PrRef> {
        let notif = notifications::get_notification(&self.pool, notification_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("notification {notification_id}")))?;
        parse_subject_url(notif.subject_url.as_deref())
            .map(|parsed| parsed.pr_ref())
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "cannot resolve a pull request from notification {notification_id}"
                ))
            })
    }
}

/// Remote write failures surface as mutation errors so the front end
/// rolls back its optimistic change
fn mutation_err(e: Error) -> Error {
    match e {
        e @ Error::Mutation(_) => e,
        other => Error::Mutation(other.to_string()),
    }
}
