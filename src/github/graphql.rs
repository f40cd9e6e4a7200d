//! Batched subject-detail lookup via GraphQL
//!
//! One combined query resolves state and CI status for up to
//! `GRAPHQL_BATCH_SIZE` subjects at a time, grouped by repository with
//! one alias per node. Per-node failures (deleted or private subjects
//! come back as null) resolve to `(None, None)` for that node only.

use super::{GithubClient, ParsedSubject, RemoteNotification, SubjectDetails, SubjectKind};
use crate::types::{CiStatus, SubjectState};
use crate::{Error, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Nodes per combined query, conservative vs GitHub's ~500 cap
pub const GRAPHQL_BATCH_SIZE: usize = 100;

const PR_FRAGMENT: &str = "\
fragment PrDetails on PullRequest {
  state
  merged
  commits(last: 1) { nodes { commit { statusCheckRollup { state } } } }
}";

const ISSUE_FRAGMENT: &str = "\
fragment IssueDetails on Issue {
  state
}";

/// Reject anything that could break out of a quoted GraphQL string.
///
/// Owner and repo names are interpolated into the query text (aliases
/// cannot be parameterized), so they are restricted to the characters
/// GitHub itself allows in those names.
fn validate_identifier(s: &str) -> Result<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("identifier regex"));
    if re.is_match(s) {
        Ok(s)
    } else {
        Err(Error::InvalidInput(format!("invalid GraphQL identifier: {s:?}")))
    }
}

/// Build one combined query for a batch of subjects.
///
/// Returns the query text and the alias → notification-ID mapping
/// needed to decode the response.
pub fn build_subject_details_query(
    subjects: &[(String, ParsedSubject)],
) -> Result<(String, HashMap<String, String>)> {
    // Group by (owner, repo), preserving first-seen order
    let mut repo_order: Vec<(String, String)> = Vec::new();
    let mut repos: HashMap<(String, String), Vec<&(String, ParsedSubject)>> = HashMap::new();
    for entry in subjects {
        let key = (entry.1.owner.clone(), entry.1.repo.clone());
        if !repos.contains_key(&key) {
            repo_order.push(key.clone());
        }
        repos.entry(key).or_default().push(entry);
    }

    let mut alias_map = HashMap::new();
    let mut repo_blocks = Vec::new();
    let mut has_pr = false;
    let mut has_issue = false;

    for (repo_idx, key) in repo_order.iter().enumerate() {
        let (owner, repo) = key;
        validate_identifier(owner)?;
        validate_identifier(repo)?;

        let mut node_lines = Vec::new();
        for (nid, parsed) in repos[key].iter().map(|e| (&e.0, &e.1)) {
            let alias = match parsed.kind {
                SubjectKind::PullRequest => {
                    has_pr = true;
                    let alias = format!("pr_{nid}");
                    node_lines.push(format!(
                        "    {alias}: pullRequest(number: {}) {{ ...PrDetails }}",
                        parsed.number
                    ));
                    alias
                }
                SubjectKind::Issue => {
                    has_issue = true;
                    let alias = format!("issue_{nid}");
                    node_lines.push(format!(
                        "    {alias}: issue(number: {}) {{ ...IssueDetails }}",
                        parsed.number
                    ));
                    alias
                }
            };
            alias_map.insert(alias, nid.clone());
        }

        repo_blocks.push(format!(
            "  r{repo_idx}: repository(owner: \"{owner}\", name: \"{repo}\") {{\n{}\n  }}",
            node_lines.join("\n")
        ));
    }

    let mut parts = Vec::new();
    if has_pr {
        parts.push(PR_FRAGMENT.to_string());
    }
    if has_issue {
        parts.push(ISSUE_FRAGMENT.to_string());
    }
    parts.push(format!("query {{\n{}\n}}", repo_blocks.join("\n")));

    Ok((parts.join("\n"), alias_map))
}

/// Extract (subject_state, ci_status) from a PR node
fn parse_pr_node(node: &Value) -> SubjectDetails {
    let merged = node.get("merged").and_then(Value::as_bool).unwrap_or(false);
    let state = node.get("state").and_then(Value::as_str).unwrap_or("");
    let subject_state = if merged {
        Some(SubjectState::Merged)
    } else {
        match state {
            "OPEN" => Some(SubjectState::Open),
            "CLOSED" => Some(SubjectState::Closed),
            _ => None,
        }
    };

    let ci_status = node
        .get("commits")
        .and_then(|c| c.get("nodes"))
        .and_then(Value::as_array)
        .and_then(|nodes| nodes.first())
        .and_then(|n| n.get("commit"))
        .and_then(|c| c.get("statusCheckRollup"))
        .and_then(|r| r.get("state"))
        .and_then(Value::as_str)
        .and_then(|s| CiStatus::parse(&s.to_lowercase()));

    (subject_state, ci_status)
}

/// Extract (subject_state, ci_status) from an Issue node
fn parse_issue_node(node: &Value) -> SubjectDetails {
    let state = node.get("state").and_then(Value::as_str).unwrap_or("");
    let subject_state = match state {
        "OPEN" => Some(SubjectState::Open),
        "CLOSED" => Some(SubjectState::Closed),
        _ => None,
    };
    (subject_state, None)
}

/// Decode the `data` object of a batch response into per-notification
/// details. Null nodes (deleted / inaccessible) map to `(None, None)`.
pub fn parse_subject_details_response(
    data: &Value,
    alias_map: &HashMap<String, String>,
) -> HashMap<String, SubjectDetails> {
    let mut results = HashMap::new();
    let Some(repos) = data.as_object() else {
        return results;
    };

    for repo_data in repos.values() {
        let Some(nodes) = repo_data.as_object() else {
            continue; // repository itself null (deleted / no access)
        };
        for (alias, node) in nodes {
            let Some(nid) = alias_map.get(alias) else {
                continue;
            };
            let details = if node.is_null() {
                (None, None)
            } else if alias.starts_with("pr_") {
                parse_pr_node(node)
            } else {
                parse_issue_node(node)
            };
            results.insert(nid.clone(), details);
        }
    }
    results
}

impl GithubClient {
    /// Batch-fetch subject state and CI status for notifications.
    ///
    /// Subjects with unparseable URLs are excluded from the result map;
    /// callers default them to unknown. Batches beyond the node cap are
    /// issued as sequential calls. Every aliased node gets an entry in
    /// the result, `(None, None)` when the server had nothing for it.
    pub async fn batch_subject_details(
        &self,
        notifications: &[RemoteNotification],
    ) -> Result<HashMap<String, SubjectDetails>> {
        let subjects: Vec<(String, ParsedSubject)> = notifications
            .iter()
            .filter_map(|n| {
                super::parse_subject_url(n.subject_url.as_deref())
                    .map(|parsed| (n.id.clone(), parsed))
            })
            .collect();

        let mut results = HashMap::new();
        for batch in subjects.chunks(GRAPHQL_BATCH_SIZE) {
            let (query, alias_map) = build_subject_details_query(batch)?;
            let body = self.graphql(&json!({ "query": query })).await?;

            if let Some(data) = body.get("data").filter(|d| !d.is_null()) {
                results.extend(parse_subject_details_response(data, &alias_map));
            }
            // Anything the response didn't cover resolves to unknown
            for nid in alias_map.values() {
                results.entry(nid.clone()).or_insert((None, None));
            }
        }
        Ok(results)
    }
}
