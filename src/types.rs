//! Shared enum types for gh-triage
//!
//! Notification attributes arrive as loosely-typed JSON and are parsed
//! into these enums at the ingestion boundary. They round-trip through
//! the database as TEXT via `as_str` / `parse_*`.

use serde::{Deserialize, Serialize};

/// What a notification is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectType {
    PullRequest,
    Issue,
    /// Anything else GitHub emits (releases, discussions, CI runs, ...)
    Other(String),
}

impl SubjectType {
    pub fn from_api(s: &str) -> Self {
        match s {
            "PullRequest" => Self::PullRequest,
            "Issue" => Self::Issue,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PullRequest => "PullRequest",
            Self::Issue => "Issue",
            Self::Other(s) => s,
        }
    }

    /// Only PRs and Issues have a resolvable subject to batch-enrich
    pub fn is_enrichable(&self) -> bool {
        matches!(self, Self::PullRequest | Self::Issue)
    }
}

/// Coarse urgency bucket derived from the priority score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Blocking,
    Action,
    Fyi,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Action => "action",
            Self::Fyi => "fyi",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open/closed/merged state of the notification's subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectState {
    Open,
    Closed,
    Merged,
}

impl SubjectState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }
}

/// CI check rollup state for the subject's head commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiStatus {
    Success,
    Failure,
    Pending,
    Error,
}

impl CiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "pending" => Some(Self::Pending),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}
