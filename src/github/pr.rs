//! PR-specific fetches and mutations: metadata, review threads, files,
//! replies, reviews, thread resolution

use super::{check_response, parse_next_link, GithubClient, PrRef, API_BASE};
use crate::{Error, Result};
use serde_json::{json, Value};

/// PR metadata as fetched via GraphQL
#[derive(Debug, Clone, PartialEq)]
pub struct PrMetadata {
    pub pr_number: i64,
    pub author: String,
    pub body: Option<String>,
    /// JSON-encoded label name array, stored verbatim in the cache
    pub labels_json: String,
    pub base_ref: Option<String>,
    pub head_ref: Option<String>,
}

/// A review as fetched from the reviews connection
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteReview {
    pub review_id: String,
    pub author: String,
    pub state: String,
    pub body: String,
    pub submitted_at: Option<String>,
}

/// A thread comment, flattened across review threads
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteReviewComment {
    pub comment_id: String,
    pub thread_id: String,
    pub author: String,
    pub body: String,
    pub path: Option<String>,
    pub diff_hunk: Option<String>,
    pub line: Option<i64>,
    pub is_resolved: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A changed file from the REST files endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePrFile {
    pub filename: String,
    pub status: String,
    pub additions: i64,
    pub deletions: i64,
    pub patch: Option<String>,
}

/// Review verdicts the API accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    Approve,
    RequestChanges,
    Comment,
}

impl ReviewEvent {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::RequestChanges => "REQUEST_CHANGES",
            Self::Comment => "COMMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPROVE" => Some(Self::Approve),
            "REQUEST_CHANGES" => Some(Self::RequestChanges),
            "COMMENT" => Some(Self::Comment),
            _ => None,
        }
    }
}

const PR_METADATA_QUERY: &str = "\
query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $number) {
      number
      author { login }
      body
      labels(first: 50) { nodes { name } }
      baseRefName
      headRefName
    }
  }
}";

const REVIEW_THREADS_QUERY: &str = "\
query($owner: String!, $repo: String!, $number: Int!, $threadsCursor: String) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $number) {
      reviewThreads(first: 100, after: $threadsCursor) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          isResolved
          comments(first: 100) {
            nodes {
              id
              author { login }
              body
              path
              diffHunk
              line
              createdAt
              updatedAt
            }
          }
        }
      }
      reviews(first: 100) {
        nodes {
          id
          author { login }
          state
          body
          submittedAt
        }
      }
    }
  }
}";

const RESOLVE_THREAD_MUTATION: &str = "\
mutation($threadId: ID!) {
  resolveReviewThread(input: {threadId: $threadId}) {
    thread { id isResolved }
  }
}";

const UNRESOLVE_THREAD_MUTATION: &str = "\
mutation($threadId: ID!) {
  unresolveReviewThread(input: {threadId: $threadId}) {
    thread { id isResolved }
  }
}";

fn author_login(node: &Value) -> String {
    node.get("author")
        .and_then(|a| a.get("login"))
        .and_then(Value::as_str)
        .unwrap_or("[deleted]")
        .to_string()
}

fn pull_request<'a>(body: &'a Value) -> Result<&'a Value> {
    body.get("data")
        .and_then(|d| d.get("repository"))
        .and_then(|r| r.get("pullRequest"))
        .filter(|pr| !pr.is_null())
        .ok_or_else(|| Error::Graphql("response has no pullRequest node".to_string()))
}

/// Decode a PR metadata response into the flat shape the cache stores
pub fn parse_pr_metadata(body: &Value) -> Result<PrMetadata> {
    let pr = pull_request(body)?;
    let labels: Vec<String> = pr
        .get("labels")
        .and_then(|l| l.get("nodes"))
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|n| n.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(PrMetadata {
        pr_number: pr
            .get("number")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Graphql("pullRequest.number missing".to_string()))?,
        author: author_login(pr),
        body: pr.get("body").and_then(Value::as_str).map(str::to_string),
        labels_json: serde_json::to_string(&labels)
            .map_err(|e| Error::Graphql(e.to_string()))?,
        base_ref: pr.get("baseRefName").and_then(Value::as_str).map(str::to_string),
        head_ref: pr.get("headRefName").and_then(Value::as_str).map(str::to_string),
    })
}

/// Decode one review-threads response page.
///
/// Thread comments are flattened with thread_id and the thread's
/// resolution state attached (resolution is per-thread, so every
/// comment in a thread shares it).
/// Returns (comments, reviews, has_next_page, end_cursor).
pub fn parse_review_threads(
    body: &Value,
) -> Result<(Vec<RemoteReviewComment>, Vec<RemoteReview>, bool, Option<String>)> {
    let pr = pull_request(body)?;
    let threads = pr
        .get("reviewThreads")
        .ok_or_else(|| Error::Graphql("reviewThreads missing".to_string()))?;

    let mut comments = Vec::new();
    for thread in threads.get("nodes").and_then(Value::as_array).into_iter().flatten() {
        let thread_id = thread.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let is_resolved = thread.get("isResolved").and_then(Value::as_bool).unwrap_or(false);
        for comment in thread
            .get("comments")
            .and_then(|c| c.get("nodes"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let str_field = |key: &str| {
                comment.get(key).and_then(Value::as_str).map(str::to_string)
            };
            comments.push(RemoteReviewComment {
                comment_id: str_field("id").unwrap_or_default(),
                thread_id: thread_id.clone(),
                author: author_login(comment),
                body: str_field("body").unwrap_or_default(),
                path: str_field("path"),
                diff_hunk: str_field("diffHunk"),
                line: comment.get("line").and_then(Value::as_i64),
                is_resolved,
                created_at: str_field("createdAt").unwrap_or_default(),
                updated_at: str_field("updatedAt").unwrap_or_default(),
            });
        }
    }

    let mut reviews = Vec::new();
    for review in pr
        .get("reviews")
        .and_then(|r| r.get("nodes"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let str_field = |key: &str| review.get(key).and_then(Value::as_str).map(str::to_string);
        reviews.push(RemoteReview {
            review_id: str_field("id").unwrap_or_default(),
            author: author_login(review),
            state: str_field("state").unwrap_or_default(),
            body: str_field("body").unwrap_or_default(),
            submitted_at: str_field("submittedAt"),
        });
    }

    let page_info = threads.get("pageInfo");
    let has_next = page_info
        .and_then(|p| p.get("hasNextPage"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let end_cursor = page_info
        .and_then(|p| p.get("endCursor"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok((comments, reviews, has_next, end_cursor))
}

impl GithubClient {
    /// Fetch PR metadata via GraphQL
    pub async fn pr_metadata(&self, pr: &PrRef) -> Result<PrMetadata> {
        let body = self
            .graphql(&json!({
                "query": PR_METADATA_QUERY,
                "variables": {"owner": pr.owner, "repo": pr.repo, "number": pr.number},
            }))
            .await?;
        parse_pr_metadata(&body)
    }

    /// Fetch all review threads and reviews with cursor pagination.
    ///
    /// Reviews come from the first page only; the cursor paginates
    /// threads, not reviews.
    pub async fn review_threads(
        &self,
        pr: &PrRef,
    ) -> Result<(Vec<RemoteReviewComment>, Vec<RemoteReview>)> {
        let mut all_comments = Vec::new();
        let mut all_reviews: Vec<RemoteReview> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut variables = json!({
                "owner": pr.owner, "repo": pr.repo, "number": pr.number,
            });
            if let Some(cursor) = &cursor {
                variables["threadsCursor"] = json!(cursor);
            }
            let body = self
                .graphql(&json!({ "query": REVIEW_THREADS_QUERY, "variables": variables }))
                .await?;

            let (comments, reviews, has_next, end_cursor) = parse_review_threads(&body)?;
            all_comments.extend(comments);
            if all_reviews.is_empty() {
                all_reviews = reviews;
            }
            if !has_next {
                break;
            }
            cursor = end_cursor;
        }

        Ok((all_comments, all_reviews))
    }

    /// Fetch the changed-file list via REST with Link pagination
    pub async fn pr_files(&self, pr: &PrRef) -> Result<Vec<RemotePrFile>> {
        let mut files = Vec::new();
        let mut next_url = Some(format!(
            "{API_BASE}/repos/{}/{}/pulls/{}/files",
            pr.owner, pr.repo, pr.number
        ));

        while let Some(url) = next_url.take() {
            let response = check_response(self.get(&url).send().await?).await?;
            let link = response
                .headers()
                .get("Link")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();

            let page: Vec<Value> = response.json().await?;
            for f in &page {
                let str_field = |key: &str| f.get(key).and_then(Value::as_str).map(str::to_string);
                files.push(RemotePrFile {
                    filename: str_field("filename").unwrap_or_default(),
                    status: str_field("status").unwrap_or_default(),
                    additions: f.get("additions").and_then(Value::as_i64).unwrap_or(0),
                    deletions: f.get("deletions").and_then(Value::as_i64).unwrap_or(0),
                    // Null for binary and oversized files
                    patch: str_field("patch"),
                });
            }
            next_url = parse_next_link(&link);
        }
        Ok(files)
    }

    /// Post a reply to a review comment
    pub async fn reply_to_review_comment(
        &self,
        pr: &PrRef,
        comment_id: i64,
        body: &str,
    ) -> Result<()> {
        let url = format!(
            "{API_BASE}/repos/{}/{}/pulls/{}/comments/{comment_id}/replies",
            pr.owner, pr.repo, pr.number
        );
        check_response(self.post(&url).json(&json!({ "body": body })).send().await?).await?;
        Ok(())
    }

    /// Submit a PR review
    pub async fn create_review(&self, pr: &PrRef, event: ReviewEvent, body: &str) -> Result<()> {
        let url = format!(
            "{API_BASE}/repos/{}/{}/pulls/{}/reviews",
            pr.owner, pr.repo, pr.number
        );
        let mut payload = json!({ "event": event.as_api_str() });
        if !body.is_empty() {
            payload["body"] = json!(body);
        }
        check_response(self.post(&url).json(&payload).send().await?).await?;
        Ok(())
    }

    /// Resolve or unresolve a review thread via GraphQL mutation
    pub async fn resolve_thread(&self, thread_node_id: &str, resolved: bool) -> Result<()> {
        let mutation = if resolved {
            RESOLVE_THREAD_MUTATION
        } else {
            UNRESOLVE_THREAD_MUTATION
        };
        let body = self
            .graphql(&json!({
                "query": mutation,
                "variables": {"threadId": thread_node_id},
            }))
            .await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array).filter(|e| !e.is_empty()) {
            return Err(Error::Mutation(format!("thread resolution failed: {errors:?}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_parsing_flattens_labels() {
        let body = json!({
            "data": {"repository": {"pullRequest": {
                "number": 12345,
                "author": {"login": "alice"},
                "body": "Bump to 3.13.2",
                "labels": {"nodes": [{"name": "python"}, {"name": "backport"}]},
                "baseRefName": "master",
                "headRefName": "python-bump"
            }}}
        });
        let meta = parse_pr_metadata(&body).unwrap();
        assert_eq!(meta.pr_number, 12345);
        assert_eq!(meta.author, "alice");
        assert_eq!(meta.labels_json, r#"["python","backport"]"#);
        assert_eq!(meta.base_ref.as_deref(), Some("master"));
    }

    #[test]
    fn metadata_with_deleted_author_and_missing_pr() {
        let body = json!({
            "data": {"repository": {"pullRequest": {
                "number": 1, "author": null, "body": null,
                "labels": {"nodes": []},
                "baseRefName": "main", "headRefName": "x"
            }}}
        });
        assert_eq!(parse_pr_metadata(&body).unwrap().author, "[deleted]");

        let gone = json!({"data": {"repository": {"pullRequest": null}}});
        assert!(parse_pr_metadata(&gone).is_err());
    }

    #[test]
    fn review_threads_flatten_with_shared_resolution() {
        let body = json!({
            "data": {"repository": {"pullRequest": {
                "reviewThreads": {
                    "pageInfo": {"hasNextPage": true, "endCursor": "abc"},
                    "nodes": [{
                        "id": "T1",
                        "isResolved": true,
                        "comments": {"nodes": [
                            {"id": "C1", "author": {"login": "bob"}, "body": "nit",
                             "path": "src/lib.rs", "diffHunk": "@@", "line": 4,
                             "createdAt": "2026-01-01T00:00:00Z", "updatedAt": "2026-01-01T00:00:00Z"},
                            {"id": "C2", "author": null, "body": "fixed",
                             "path": "src/lib.rs", "diffHunk": "@@", "line": 4,
                             "createdAt": "2026-01-02T00:00:00Z", "updatedAt": "2026-01-02T00:00:00Z"}
                        ]}
                    }]
                },
                "reviews": {"nodes": [
                    {"id": "R1", "author": {"login": "bob"}, "state": "CHANGES_REQUESTED",
                     "body": "see comments", "submittedAt": "2026-01-01T00:00:00Z"}
                ]}
            }}}
        });

        let (comments, reviews, has_next, cursor) = parse_review_threads(&body).unwrap();
        assert_eq!(comments.len(), 2);
        assert!(comments.iter().all(|c| c.thread_id == "T1" && c.is_resolved));
        assert_eq!(comments[1].author, "[deleted]");
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].state, "CHANGES_REQUESTED");
        assert!(has_next);
        assert_eq!(cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn review_event_round_trip() {
        assert_eq!(ReviewEvent::parse("APPROVE"), Some(ReviewEvent::Approve));
        assert_eq!(
            ReviewEvent::parse("REQUEST_CHANGES").unwrap().as_api_str(),
            "REQUEST_CHANGES"
        );
        assert_eq!(ReviewEvent::parse("MERGE"), None);
    }
}
