//! GitHub REST implementations of [`IssueTracker`] and [`ArtifactStore`].

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::artifacts::{self, ArtifactStore, UploadOutcome};
use crate::core::Report;
use crate::runner_id::RunId;
use crate::tracker::{Comment, Issue, IssueState, IssueTracker, RepoRef};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 50;

pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: String,
    /// Where uploads are staged for the runner's own upload step.
    staging_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    number: u64,
    state: IssueState,
    user: Option<User>,
    body: Option<String>,
    #[serde(default)]
    comments: u64,
}

#[derive(Debug, Deserialize)]
struct CommentItem {
    user: Option<User>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct ArtifactList {
    artifacts: Vec<ArtifactItem>,
}

#[derive(Debug, Deserialize)]
struct ArtifactItem {
    name: String,
    archive_download_url: String,
    #[serde(default)]
    expired: bool,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str, staging_dir: PathBuf, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("zaptrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            staging_dir,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn send(&self, req: RequestBuilder, what: &str) -> Result<reqwest::blocking::Response> {
        let resp = self
            .authed(req)
            .send()
            .with_context(|| format!("GitHub request failed: {what}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("GitHub returned {status} for {what}: {}", body.trim()));
        }
        Ok(resp)
    }

    fn download_report(&self, url: &str) -> Result<Report> {
        let bytes = self
            .send(self.http.get(url), "artifact download")?
            .bytes()
            .context("failed to read artifact archive")?;
        report_from_zip(&bytes)
    }
}

/// Reads the JSON report out of an artifact zip archive.
pub fn report_from_zip(bytes: &[u8]) -> Result<Report> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .context("artifact is not a valid zip archive")?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("failed to read zip entry")?;
        let is_report = entry
            .name()
            .rsplit('/')
            .next()
            .is_some_and(|name| name == artifacts::JSON_REPORT);
        if !is_report {
            continue;
        }
        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .context("failed to extract report from artifact")?;
        return Report::from_slice(&buf);
    }
    Err(anyhow!("artifact does not contain {}", artifacts::JSON_REPORT))
}

/// Fetches pages `1..=max_pages` until one comes back short. The flag is set
/// when the last allowed page was full, i.e. items may remain unread.
fn collect_pages<T>(
    max_pages: usize,
    mut fetch: impl FnMut(usize) -> Result<Vec<T>>,
) -> Result<(Vec<T>, bool)> {
    let mut items = Vec::new();
    for page in 1..=max_pages {
        let batch = fetch(page)?;
        let len = batch.len();
        items.extend(batch);
        if len < PER_PAGE {
            return Ok((items, false));
        }
    }
    Ok((items, true))
}

impl IssueTracker for GitHubClient {
    fn search_open_issues(&self, repo: &RepoRef, title: &str) -> Result<Vec<Issue>> {
        let q = format!("is:issue state:open repo:{repo} {title}");
        let resp: SearchResponse = self
            .send(
                self.http
                    .get(self.url("/search/issues"))
                    .query(&[("q", q.as_str()), ("sort", "updated")]),
                "issue search",
            )?
            .json()
            .context("failed to decode issue search response")?;

        Ok(resp
            .items
            .into_iter()
            .map(|item| Issue {
                number: item.number,
                state: item.state,
                author: item.user.map(|u| u.login).unwrap_or_default(),
                body: item.body.unwrap_or_default(),
                comments: item.comments,
            })
            .collect())
    }

    fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<Comment>> {
        let path = format!("/repos/{}/{}/issues/{number}/comments", repo.owner, repo.repo);
        let (items, truncated) = collect_pages(MAX_PAGES, |page| {
            self.send(
                self.http.get(self.url(&path)).query(&[
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ]),
                "list comments",
            )?
            .json::<Vec<CommentItem>>()
            .context("failed to decode comments response")
        })?;
        if truncated {
            warn!(
                "issue #{number} reached the read limit of {} comments; newer comments may be missing",
                items.len()
            );
        }
        Ok(items
            .into_iter()
            .map(|c| Comment {
                author: c.user.map(|u| u.login).unwrap_or_default(),
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> Result<u64> {
        let path = format!("/repos/{}/{}/issues", repo.owner, repo.repo);
        let created: CreatedIssue = self
            .send(
                self.http
                    .post(self.url(&path))
                    .json(&json!({ "title": title, "body": body })),
                "create issue",
            )?
            .json()
            .context("failed to decode created issue")?;
        Ok(created.number)
    }

    fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<()> {
        let path = format!("/repos/{}/{}/issues/{number}/comments", repo.owner, repo.repo);
        self.send(
            self.http.post(self.url(&path)).json(&json!({ "body": body })),
            "create comment",
        )?;
        Ok(())
    }

    fn close_issue(&self, repo: &RepoRef, number: u64) -> Result<()> {
        let path = format!("/repos/{}/{}/issues/{number}", repo.owner, repo.repo);
        self.send(
            self.http
                .patch(self.url(&path))
                .json(&json!({ "state": "closed" })),
            "close issue",
        )?;
        Ok(())
    }
}

impl ArtifactStore for GitHubClient {
    fn fetch_report(&self, repo: &RepoRef, run_id: &RunId, name: &str) -> Result<Report> {
        let path = format!(
            "/repos/{}/{}/actions/runs/{run_id}/artifacts",
            repo.owner, repo.repo
        );
        let list: ArtifactList = self
            .send(
                self.http
                    .get(self.url(&path))
                    .query(&[("per_page", PER_PAGE.to_string())]),
                "list run artifacts",
            )?
            .json()
            .context("failed to decode artifact list")?;

        let artifact = list
            .artifacts
            .into_iter()
            .find(|a| a.name == name && !a.expired)
            .ok_or_else(|| anyhow!("run {run_id} has no artifact named {name:?}"))?;
        self.download_report(&artifact.archive_download_url)
            .with_context(|| format!("artifact {name:?} of run {run_id}"))
    }

    fn upload(
        &self,
        _repo: &RepoRef,
        _run_id: &RunId,
        name: &str,
        files: &[PathBuf],
    ) -> Result<UploadOutcome> {
        artifacts::copy_into(&self.staging_dir.join(name), files)
    }
}
