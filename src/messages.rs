//! Request/response message types for front end ↔ worker communication
//!
//! The front end never touches the network: it submits a `Request` and
//! later drains the matching `Response`. Worker-side failures are
//! always delivered as `Response::Error` carrying the originating
//! request's name, never thrown across the channel, so optimistic UI
//! changes can be rolled back deterministically.

use crate::github::pr::ReviewEvent;
use crate::sync::SyncSummary;

/// Requests the front end can submit to the worker
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Mark notifications as read upstream and delete them locally
    MarkDone { notification_ids: Vec<String> },
    /// Fetch and cache comments for one notification
    FetchComments { notification_id: String },
    /// Pre-load comments for the top N notifications by priority
    PreloadComments { top_n: usize },
    /// Fetch and cache full PR data (metadata, reviews, files)
    FetchPrDetail { notification_id: String },
    /// Post a reply to a review comment thread
    PostReviewReply {
        notification_id: String,
        comment_id: i64,
        body: String,
    },
    /// Submit a PR review
    SubmitReview {
        notification_id: String,
        event: ReviewEvent,
        body: String,
    },
    /// Resolve or unresolve a review thread
    ResolveThread {
        notification_id: String,
        thread_node_id: String,
        resolve: bool,
    },
    /// Run a full sync pass
    Sync,
}

impl Request {
    /// Stable name used in error responses and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::MarkDone { .. } => "mark-done",
            Self::FetchComments { .. } => "fetch-comments",
            Self::PreloadComments { .. } => "preload-comments",
            Self::FetchPrDetail { .. } => "fetch-pr-detail",
            Self::PostReviewReply { .. } => "post-review-reply",
            Self::SubmitReview { .. } => "submit-review",
            Self::ResolveThread { .. } => "resolve-thread",
            Self::Sync => "sync",
        }
    }
}

/// Responses the worker posts back, one per request
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Which notifications were marked done; per-ID failures listed
    MarkDone {
        notification_ids: Vec<String>,
        errors: Vec<String>,
    },
    FetchComments {
        notification_id: String,
        comment_count: usize,
    },
    PreloadComplete { loaded_ids: Vec<String> },
    FetchPrDetail { notification_id: String },
    PostReviewReply { notification_id: String },
    SubmitReview { notification_id: String },
    ResolveThread { notification_id: String },
    SyncComplete { summary: SyncSummary },
    /// A request failed; carries the request name and a readable cause
    Error { request: String, message: String },
}
