//! Shared test infrastructure for gh-triage integration tests
//!
//! `StubApi` is an in-process `GithubApi` with canned responses,
//! per-call failure injection, and in-flight instrumentation, so sync
//! and worker behavior can be tested without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use gh_triage::github::pr::{
    PrMetadata, RemotePrFile, RemoteReview, RemoteReviewComment, ReviewEvent,
};
use gh_triage::github::{
    GithubApi, PrRef, RemoteComment, RemoteNotification, SubjectDetails,
};
use gh_triage::types::SubjectType;
use gh_triage::{Error, Result};

/// Build a PR notification with a well-formed subject URL and raw payload
pub fn remote_pr(id: &str, reason: &str, updated_at: &str) -> RemoteNotification {
    let subject_url = format!("https://api.github.com/repos/NixOS/nixpkgs/pulls/{id}");
    RemoteNotification {
        id: id.to_string(),
        repo_owner: "NixOS".to_string(),
        repo_name: "nixpkgs".to_string(),
        subject_type: SubjectType::PullRequest,
        subject_title: format!("pull request {id}"),
        subject_url: Some(subject_url.clone()),
        reason: reason.to_string(),
        updated_at: updated_at.to_string(),
        unread: true,
        raw: json!({
            "id": id,
            "subject": {"type": "PullRequest", "url": subject_url},
        }),
    }
}

/// Build a notification with no comments endpoint (release, CI run, ...)
pub fn remote_other(id: &str, updated_at: &str) -> RemoteNotification {
    RemoteNotification {
        id: id.to_string(),
        repo_owner: "NixOS".to_string(),
        repo_name: "nixpkgs".to_string(),
        subject_type: SubjectType::Other("Release".to_string()),
        subject_title: format!("release {id}"),
        subject_url: None,
        reason: "subscribed".to_string(),
        updated_at: updated_at.to_string(),
        unread: true,
        raw: json!({
            "id": id,
            "subject": {"type": "Release", "url": null},
        }),
    }
}

pub fn remote_comment(id: &str, author: &str, body: &str) -> RemoteComment {
    RemoteComment {
        id: id.to_string(),
        author: author.to_string(),
        body: body.to_string(),
        created_at: "2026-02-09T06:00:00Z".to_string(),
        updated_at: "2026-02-09T06:00:00Z".to_string(),
    }
}

/// Canned GitHub backend with failure injection and call accounting.
///
/// Interior mutability keeps the stub usable behind `&dyn GithubApi`
/// and `Arc<dyn GithubApi>` alike.
#[derive(Default)]
pub struct StubApi {
    pub notifications: Mutex<Vec<RemoteNotification>>,
    pub details: Mutex<HashMap<String, SubjectDetails>>,
    /// Comments returned for every comments URL
    pub comments: Mutex<Vec<RemoteComment>>,
    /// Comments URLs whose fetch fails with an API error
    pub failing_comment_urls: Mutex<HashSet<String>>,
    /// Thread IDs whose mark-as-read fails with an API error
    pub failing_mark_ids: Mutex<HashSet<String>>,
    /// Rate-limit the next notifications listing
    pub rate_limit_list: Mutex<bool>,
    /// Rate-limit the next subject-details batch
    pub rate_limit_details: Mutex<bool>,
    /// Per-call delay in fetch_comments, to widen the concurrency window
    pub comment_delay: Mutex<Option<Duration>>,

    pub detail_calls: AtomicUsize,
    pub comment_calls: AtomicUsize,
    pub marked_read: Mutex<Vec<String>>,
    comments_in_flight: AtomicUsize,
    pub max_comments_in_flight: AtomicUsize,
}

impl StubApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_notifications(&self, notifications: Vec<RemoteNotification>) {
        *self.notifications.lock().unwrap() = notifications;
    }

    pub fn set_details(&self, details: HashMap<String, SubjectDetails>) {
        *self.details.lock().unwrap() = details;
    }

    pub fn set_comments(&self, comments: Vec<RemoteComment>) {
        *self.comments.lock().unwrap() = comments;
    }

    pub fn fail_mark_for(&self, thread_id: &str) {
        self.failing_mark_ids.lock().unwrap().insert(thread_id.to_string());
    }

    fn api_error(message: &str) -> Error {
        Error::Api { status: 500, message: message.to_string() }
    }
}

#[async_trait]
impl GithubApi for StubApi {
    async fn fetch_notifications(&self, _since: Option<&str>) -> Result<Vec<RemoteNotification>> {
        if std::mem::take(&mut *self.rate_limit_list.lock().unwrap()) {
            return Err(Error::RateLimited { reset: None });
        }
        Ok(self.notifications.lock().unwrap().clone())
    }

    async fn fetch_subject_details(
        &self,
        _notifications: &[RemoteNotification],
    ) -> Result<HashMap<String, SubjectDetails>> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if std::mem::take(&mut *self.rate_limit_details.lock().unwrap()) {
            return Err(Error::RateLimited { reset: None });
        }
        Ok(self.details.lock().unwrap().clone())
    }

    async fn fetch_comments(&self, comments_url: &str) -> Result<Vec<RemoteComment>> {
        self.comment_calls.fetch_add(1, Ordering::SeqCst);

        let in_flight = self.comments_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_comments_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        let delay = *self.comment_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.comments_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_comment_urls.lock().unwrap().contains(comments_url) {
            return Err(Self::api_error("comments unavailable"));
        }
        Ok(self.comments.lock().unwrap().clone())
    }

    async fn mark_as_read(&self, thread_id: &str) -> Result<()> {
        if self.failing_mark_ids.lock().unwrap().contains(thread_id) {
            return Err(Self::api_error("mark read failed"));
        }
        self.marked_read.lock().unwrap().push(thread_id.to_string());
        Ok(())
    }

    async fn fetch_pr_metadata(&self, pr: &PrRef) -> Result<PrMetadata> {
        Ok(PrMetadata {
            pr_number: pr.number,
            author: "jtojnar".to_string(),
            body: Some("PR body".to_string()),
            labels_json: r#"["10.rebuild-linux: 1-10"]"#.to_string(),
            base_ref: Some("master".to_string()),
            head_ref: Some("update".to_string()),
        })
    }

    async fn fetch_review_threads(
        &self,
        _pr: &PrRef,
    ) -> Result<(Vec<RemoteReviewComment>, Vec<RemoteReview>)> {
        let comment = RemoteReviewComment {
            comment_id: "rc1".to_string(),
            thread_id: "t1".to_string(),
            author: "reviewer".to_string(),
            body: "nit: rename this".to_string(),
            path: Some("pkgs/default.nix".to_string()),
            diff_hunk: Some("@@ -1 +1 @@".to_string()),
            line: Some(12),
            is_resolved: false,
            created_at: "2026-02-09T06:00:00Z".to_string(),
            updated_at: "2026-02-09T06:00:00Z".to_string(),
        };
        let review = RemoteReview {
            review_id: "rv1".to_string(),
            author: "reviewer".to_string(),
            state: "CHANGES_REQUESTED".to_string(),
            body: "see comments".to_string(),
            submitted_at: Some("2026-02-09T06:05:00Z".to_string()),
        };
        Ok((vec![comment], vec![review]))
    }

    async fn fetch_pr_files(&self, _pr: &PrRef) -> Result<Vec<RemotePrFile>> {
        Ok(vec![RemotePrFile {
            filename: "pkgs/default.nix".to_string(),
            status: "modified".to_string(),
            additions: 3,
            deletions: 1,
            patch: Some("@@ -1 +3 @@".to_string()),
        }])
    }

    async fn post_review_reply(&self, _pr: &PrRef, _comment_id: i64, _body: &str) -> Result<()> {
        Ok(())
    }

    async fn submit_review(&self, _pr: &PrRef, _event: ReviewEvent, _body: &str) -> Result<()> {
        Ok(())
    }

    async fn set_thread_resolved(&self, _thread_node_id: &str, _resolved: bool) -> Result<()> {
        Ok(())
    }
}
