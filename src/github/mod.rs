//! GitHub API client
//!
//! REST for notification listing, comments, files, and simple
//! mutations; GraphQL for batched subject lookups, PR metadata, review
//! threads, and thread resolution. All calls carry the bearer token
//! obtained once per process from the `gh` CLI (see `auth`).
//!
//! The `GithubApi` trait is the seam the sync orchestrator and worker
//! depend on, so their tests run against a stub with no network.

pub mod auth;
pub mod graphql;
pub mod notifications;
pub mod pr;

use crate::types::{CiStatus, SubjectState, SubjectType};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

pub const API_BASE: &str = "https://api.github.com";
pub const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const USER_AGENT: &str = "gh-triage/0.1.0";
// GraphQL batch queries can be slow
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const RATE_LIMIT_WARNING_THRESHOLD: i64 = 100;

/// (subject_state, ci_status) resolved for one notification
pub type SubjectDetails = (Option<SubjectState>, Option<CiStatus>);

/// A notification as fetched from the API: typed projection plus the
/// verbatim payload for forward-compatible field extraction
#[derive(Debug, Clone)]
pub struct RemoteNotification {
    pub id: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub subject_type: SubjectType,
    pub subject_title: String,
    pub subject_url: Option<String>,
    pub reason: String,
    pub updated_at: String,
    pub unread: bool,
    pub raw: Value,
}

impl RemoteNotification {
    /// Parse one element of the notifications list response.
    ///
    /// The raw payload is kept verbatim; only the fields the cache and
    /// priority engine need are projected out.
    pub fn from_value(raw: Value) -> Result<Self> {
        let get = |path: &[&str]| -> Option<&Value> {
            let mut v = &raw;
            for key in path {
                v = v.get(key)?;
            }
            Some(v)
        };
        let str_at = |path: &[&str]| -> Result<String> {
            get(path)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidInput(format!("notification missing {}", path.join("."))))
        };

        Ok(Self {
            id: str_at(&["id"])?,
            repo_owner: str_at(&["repository", "owner", "login"])?,
            repo_name: str_at(&["repository", "name"])?,
            subject_type: SubjectType::from_api(&str_at(&["subject", "type"])?),
            subject_title: str_at(&["subject", "title"])?,
            subject_url: get(&["subject", "url"]).and_then(Value::as_str).map(str::to_string),
            reason: str_at(&["reason"])?,
            updated_at: str_at(&["updated_at"])?,
            unread: get(&["unread"]).and_then(Value::as_bool).unwrap_or(true),
            raw,
        })
    }

    /// Browser URL derived from the API subject URL
    pub fn html_url(&self) -> Option<String> {
        self.subject_url.as_ref().map(|u| {
            u.replace("api.github.com/repos", "github.com")
                .replace("/pulls/", "/pull/")
        })
    }
}

/// An issue/PR comment as fetched from the REST API
#[derive(Debug, Clone)]
pub struct RemoteComment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Identifies a pull request on GitHub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: i64,
}

/// What the subject URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    PullRequest,
    Issue,
}

/// A parsed GitHub subject URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubject {
    pub owner: String,
    pub repo: String,
    pub number: i64,
    pub kind: SubjectKind,
}

impl ParsedSubject {
    pub fn pr_ref(&self) -> PrRef {
        PrRef {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            number: self.number,
        }
    }
}

/// Extract owner, repo, number, and kind from an API subject URL.
///
/// Returns None for absent URLs and URLs that are not a PR or issue
/// (releases, check runs, ...).
pub fn parse_subject_url(url: Option<&str>) -> Option<ParsedSubject> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r"^https://api\.github\.com/repos/(?P<owner>[^/]+)/(?P<repo>[^/]+)/(?P<kind>pulls|issues)/(?P<number>\d+)$",
        )
        .expect("subject URL regex")
    });
    let caps = re.captures(url?)?;
    Some(ParsedSubject {
        owner: caps["owner"].to_string(),
        repo: caps["repo"].to_string(),
        number: caps["number"].parse().ok()?,
        kind: if &caps["kind"] == "pulls" {
            SubjectKind::PullRequest
        } else {
            SubjectKind::Issue
        },
    })
}

/// Comments URL for a PR/Issue subject URL.
///
/// PR comments live on the issues endpoint:
/// `/repos/o/r/pulls/1` becomes `/repos/o/r/issues/1/comments`.
pub fn comments_url_from_subject(subject_url: Option<&str>) -> Option<String> {
    let url = subject_url?;
    if url.contains("/pulls/") {
        Some(url.replace("/pulls/", "/issues/") + "/comments")
    } else if url.contains("/issues/") {
        Some(url.to_string() + "/comments")
    } else {
        None
    }
}

/// Extract the `next` URL from a GitHub Link header
pub fn parse_next_link(link_header: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"<([^>]+)>;\s*rel="next""#).expect("link regex"));
    re.captures(link_header).map(|c| c[1].to_string())
}

/// Operations the sync orchestrator and worker need from GitHub
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// List notifications, optionally only those updated since a timestamp
    async fn fetch_notifications(&self, since: Option<&str>) -> Result<Vec<RemoteNotification>>;

    /// Batch-resolve subject state and CI status, keyed by notification ID.
    /// Per-node failures yield `(None, None)` entries, never a batch error.
    async fn fetch_subject_details(
        &self,
        notifications: &[RemoteNotification],
    ) -> Result<HashMap<String, SubjectDetails>>;

    /// Fetch all pages of comments from an issue/PR comments URL
    async fn fetch_comments(&self, comments_url: &str) -> Result<Vec<RemoteComment>>;

    /// Mark a notification thread as read upstream
    async fn mark_as_read(&self, thread_id: &str) -> Result<()>;

    /// Fetch PR metadata (author, body, labels, branch refs)
    async fn fetch_pr_metadata(&self, pr: &PrRef) -> Result<pr::PrMetadata>;

    /// Fetch all review threads (flattened comments) and reviews
    async fn fetch_review_threads(
        &self,
        pr: &PrRef,
    ) -> Result<(Vec<pr::RemoteReviewComment>, Vec<pr::RemoteReview>)>;

    /// Fetch the changed-file list for a PR
    async fn fetch_pr_files(&self, pr: &PrRef) -> Result<Vec<pr::RemotePrFile>>;

    /// Post a reply to a review comment thread
    async fn post_review_reply(&self, pr: &PrRef, comment_id: i64, body: &str) -> Result<()>;

    /// Submit a PR review (approve / request changes / comment)
    async fn submit_review(&self, pr: &PrRef, event: pr::ReviewEvent, body: &str) -> Result<()>;

    /// Resolve or unresolve a review thread
    async fn set_thread_resolved(&self, thread_node_id: &str, resolved: bool) -> Result<()>;
}

/// The reqwest-backed client
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
}

impl GithubClient {
    pub fn new(token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, token })
    }

    pub(crate) fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.get(url))
    }

    pub(crate) fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.post(url))
    }

    pub(crate) fn patch(&self, url: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.patch(url))
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    /// Issue a GraphQL request and return the response body.
    ///
    /// Top-level GraphQL errors are logged, not fatal: partial data is
    /// still worth keeping (a single deleted repo should not sink a
    /// hundred-node batch).
    pub(crate) async fn graphql(&self, body: &Value) -> Result<Value> {
        let response = self.post(GRAPHQL_URL).json(body).send().await?;
        let response = check_response(response).await?;
        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array).filter(|e| !e.is_empty()) {
            tracing::warn!(errors = ?errors, "GraphQL errors in response");
        }
        Ok(body)
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn fetch_notifications(&self, since: Option<&str>) -> Result<Vec<RemoteNotification>> {
        self.list_notifications(since).await
    }

    async fn fetch_subject_details(
        &self,
        notifications: &[RemoteNotification],
    ) -> Result<HashMap<String, SubjectDetails>> {
        self.batch_subject_details(notifications).await
    }

    async fn fetch_comments(&self, comments_url: &str) -> Result<Vec<RemoteComment>> {
        self.list_comments(comments_url).await
    }

    async fn mark_as_read(&self, thread_id: &str) -> Result<()> {
        self.patch_thread_read(thread_id).await
    }

    async fn fetch_pr_metadata(&self, pr: &PrRef) -> Result<pr::PrMetadata> {
        self.pr_metadata(pr).await
    }

    async fn fetch_review_threads(
        &self,
        pr: &PrRef,
    ) -> Result<(Vec<pr::RemoteReviewComment>, Vec<pr::RemoteReview>)> {
        self.review_threads(pr).await
    }

    async fn fetch_pr_files(&self, pr: &PrRef) -> Result<Vec<pr::RemotePrFile>> {
        self.pr_files(pr).await
    }

    async fn post_review_reply(&self, pr: &PrRef, comment_id: i64, body: &str) -> Result<()> {
        self.reply_to_review_comment(pr, comment_id, body).await
    }

    async fn submit_review(&self, pr: &PrRef, event: pr::ReviewEvent, body: &str) -> Result<()> {
        self.create_review(pr, event, body).await
    }

    async fn set_thread_resolved(&self, thread_node_id: &str, resolved: bool) -> Result<()> {
        self.resolve_thread(thread_node_id, resolved).await
    }
}

/// Inspect rate-limit headers and map error statuses.
///
/// Returns the response untouched on success so the caller can consume
/// the body. 403 with a rate-limit message becomes `Error::RateLimited`
/// carrying the reset time from `X-RateLimit-Reset`.
pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let remaining = response
        .headers()
        .get("X-RateLimit-Remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());
    if let Some(remaining) = remaining {
        if remaining < RATE_LIMIT_WARNING_THRESHOLD {
            tracing::warn!(remaining, "GitHub API rate limit low");
        }
    }

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let reset = response
        .headers()
        .get("X-RateLimit-Reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(parse_reset_epoch);
    let body = response.text().await.unwrap_or_default();

    if status == reqwest::StatusCode::FORBIDDEN && body.to_lowercase().contains("rate limit") {
        return Err(Error::RateLimited { reset });
    }
    Err(Error::Api {
        status: status.as_u16(),
        message: body,
    })
}

fn parse_reset_epoch(epoch: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_pull_and_issue_subject_urls() {
        let pr = parse_subject_url(Some("https://api.github.com/repos/NixOS/nixpkgs/pulls/12345"))
            .unwrap();
        assert_eq!(pr.owner, "NixOS");
        assert_eq!(pr.repo, "nixpkgs");
        assert_eq!(pr.number, 12345);
        assert_eq!(pr.kind, SubjectKind::PullRequest);

        let issue = parse_subject_url(Some("https://api.github.com/repos/o/r/issues/7")).unwrap();
        assert_eq!(issue.kind, SubjectKind::Issue);

        assert!(parse_subject_url(None).is_none());
        assert!(parse_subject_url(Some("https://api.github.com/repos/o/r/releases/1")).is_none());
    }

    #[test]
    fn comments_url_rewrites_pulls_to_issues() {
        assert_eq!(
            comments_url_from_subject(Some("https://api.github.com/repos/o/r/pulls/1")).as_deref(),
            Some("https://api.github.com/repos/o/r/issues/1/comments")
        );
        assert_eq!(
            comments_url_from_subject(Some("https://api.github.com/repos/o/r/issues/1")).as_deref(),
            Some("https://api.github.com/repos/o/r/issues/1/comments")
        );
        assert!(comments_url_from_subject(Some("https://api.github.com/repos/o/r/releases/1")).is_none());
        assert!(comments_url_from_subject(None).is_none());
    }

    #[test]
    fn next_link_is_extracted_from_link_header() {
        let header = r#"<https://api.github.com/notifications?page=2>; rel="next", <https://api.github.com/notifications?page=5>; rel="last""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://api.github.com/notifications?page=2")
        );
        assert!(parse_next_link(r#"<https://x>; rel="last""#).is_none());
        assert!(parse_next_link("").is_none());
    }

    #[test]
    fn remote_notification_projects_typed_fields() {
        let value = json!({
            "id": "1001",
            "repository": {"owner": {"login": "NixOS"}, "name": "nixpkgs"},
            "subject": {
                "type": "PullRequest",
                "title": "python313: 3.13.1 -> 3.13.2",
                "url": "https://api.github.com/repos/NixOS/nixpkgs/pulls/12345"
            },
            "reason": "review_requested",
            "updated_at": "2026-02-09T07:00:00Z",
            "unread": true
        });
        let parsed = RemoteNotification::from_value(value.clone()).unwrap();
        assert_eq!(parsed.id, "1001");
        assert_eq!(parsed.subject_type, SubjectType::PullRequest);
        assert_eq!(
            parsed.html_url().as_deref(),
            Some("https://github.com/NixOS/nixpkgs/pull/12345")
        );
        // Verbatim payload preserved for forward-compatible extraction
        assert_eq!(parsed.raw, value);
    }

    #[test]
    fn remote_notification_tolerates_null_subject_url() {
        let value = json!({
            "id": "2",
            "repository": {"owner": {"login": "o"}, "name": "r"},
            "subject": {"type": "Discussion", "title": "t", "url": null},
            "reason": "subscribed",
            "updated_at": "2026-02-09T07:00:00Z"
        });
        let parsed = RemoteNotification::from_value(value).unwrap();
        assert_eq!(parsed.subject_url, None);
        assert_eq!(parsed.html_url(), None);
        assert!(parsed.unread);
        assert_eq!(parsed.subject_type, SubjectType::Other("Discussion".to_string()));
    }
}
