use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((owner, repo)) = s.split_once('/') else {
            return Err(format!("invalid repository: {s:?} (expected owner/repo)"));
        };
        let (owner, repo) = (owner.trim(), repo.trim());
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(format!("invalid repository: {s:?} (expected owner/repo)"));
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub state: IssueState,
    pub author: String,
    pub body: String,
    /// Comment count as reported by the tracker.
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub author: String,
    pub body: String,
}

/// The issue-tracker operations a sync run needs. Comments are returned oldest
/// first.
pub trait IssueTracker {
    fn search_open_issues(&self, repo: &RepoRef, title: &str) -> Result<Vec<Issue>>;
    fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<Comment>>;
    fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> Result<u64>;
    fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<()>;
    fn close_issue(&self, repo: &RepoRef, number: u64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_repo() {
        let r: RepoRef = "octo-org/web-app".parse().expect("valid");
        assert_eq!(r.owner, "octo-org");
        assert_eq!(r.repo, "web-app");
        assert_eq!(r.to_string(), "octo-org/web-app");
    }

    #[test]
    fn rejects_malformed_repositories() {
        for bad in ["", "octo", "/app", "octo/", "a/b/c"] {
            assert!(bad.parse::<RepoRef>().is_err(), "{bad:?}");
        }
    }
}
