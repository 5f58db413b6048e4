//! Decides what to do with the tracking issue after a scan.

use serde::Serialize;

use crate::runner_id::{self, RunId};
use crate::tracker::{Comment, Issue, IssueState};

/// State of the tracking issue as seen by this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedState {
    Open,
    Closed,
    None,
}

impl TrackedState {
    pub fn of(issue: Option<&Issue>) -> Self {
        match issue.map(|i| i.state) {
            Some(IssueState::Open) => TrackedState::Open,
            Some(IssueState::Closed) => TrackedState::Closed,
            None => TrackedState::None,
        }
    }

    pub fn exists(self) -> bool {
        !matches!(self, TrackedState::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveInput {
    pub issue: TrackedState,
    pub previous_available: bool,
    /// The filtered current report has at least one alert.
    pub has_alerts: bool,
    /// `Report::updated` after diffing against the previous run.
    pub updated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    NothingToReport,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CloseWithComment,
    CreateIssue,
    CommentUpdate,
    NoOp { reason: NoOpReason },
}

/// Rules are checked in order and the first match wins.
pub fn resolve(input: &ResolveInput) -> Action {
    if !input.has_alerts {
        if input.issue == TrackedState::Open {
            return Action::CloseWithComment;
        }
        return Action::NoOp {
            reason: NoOpReason::NothingToReport,
        };
    }

    if !input.issue.exists() || !input.previous_available {
        return Action::CreateIssue;
    }

    if !input.updated {
        return Action::NoOp {
            reason: NoOpReason::Unchanged,
        };
    }
    Action::CommentUpdate
}

/// Search results can list a just-closed issue as open, so only the first
/// result that is open and authored by the automation identity counts.
pub fn select_tracking_issue<'a>(results: &'a [Issue], automation_login: &str) -> Option<&'a Issue> {
    for issue in results {
        if issue.state == IssueState::Open && issue.author == automation_login {
            return Some(issue);
        }
    }
    None
}

/// Finds the run id of the last run that reported on `issue`.
///
/// With no comments the issue body is used. Otherwise comments are scanned
/// newest first and the first automation comment carrying a parsable token
/// wins; automation comments whose token was edited away are skipped. When no
/// automation comment yields a token, the body is used.
pub fn previous_run_id(issue: &Issue, comments: &[Comment], automation_login: &str) -> Option<RunId> {
    for comment in comments.iter().rev() {
        if comment.author != automation_login {
            continue;
        }
        if let Some(id) = runner_id::parse(&comment.body) {
            return Some(id);
        }
    }
    runner_id::parse(&issue.body)
}
