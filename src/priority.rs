//! Priority scoring engine for notifications
//!
//! Pure function from notification attributes to a (score, tier) pair.
//! The score bands leave numeric gaps so sub-tiers can be inserted later
//! without renumbering. Display order is `score DESC, updated_at DESC`;
//! the recency tiebreak lives in the database query, not here.

use crate::types::{CiStatus, Tier};

pub const SCORE_REVIEW_REQUESTED_CI_PASS: i64 = 1000;
pub const SCORE_REVIEW_REQUESTED: i64 = 800;
pub const SCORE_MENTION_OR_ASSIGN: i64 = 600;
pub const SCORE_OWN_PR_CI_FAIL: i64 = 500;
pub const SCORE_TEAM_MENTION: i64 = 200;
pub const SCORE_DEFAULT: i64 = 100;

/// Compute (score, tier) for a notification.
///
/// Rules are evaluated top to bottom, first match wins:
/// 1. review_requested with passing CI outranks everything (ready to review)
/// 2. review_requested otherwise (still blocking someone)
/// 3. direct mention or assignment
/// 4. own PR with failing CI
/// 5. team mention
/// 6. everything else
pub fn compute_priority(reason: &str, ci_status: Option<CiStatus>, is_own_pr: bool) -> (i64, Tier) {
    if reason == "review_requested" {
        if ci_status == Some(CiStatus::Success) {
            return (SCORE_REVIEW_REQUESTED_CI_PASS, Tier::Blocking);
        }
        return (SCORE_REVIEW_REQUESTED, Tier::Blocking);
    }

    if reason == "mention" || reason == "assign" {
        return (SCORE_MENTION_OR_ASSIGN, Tier::Action);
    }

    if is_own_pr && ci_status == Some(CiStatus::Failure) {
        return (SCORE_OWN_PR_CI_FAIL, Tier::Action);
    }

    if reason == "team_mention" {
        return (SCORE_TEAM_MENTION, Tier::Fyi);
    }

    (SCORE_DEFAULT, Tier::Fyi)
}
