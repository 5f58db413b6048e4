use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::artifacts::{self, ArtifactStore, UploadOutcome};
use crate::compose::{self, CLOSE_COMMENT, Content};
use crate::core::{Previous, Report, Site};
use crate::diff::{self, DiffResult};
use crate::filter;
use crate::resolve::{self, Action, ResolveInput, TrackedState};
use crate::runner_id::RunId;
use crate::tracker::{Issue, IssueTracker, RepoRef};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub workspace: PathBuf,
    pub ignore: Vec<String>,
    pub run_id: RunId,
    pub issue_title: String,
    pub repo: RepoRef,
    pub allow_issue_writing: bool,
    pub artifact_name: String,
    /// Login the tracker shows as author of issues and comments this tool writes.
    pub bot_login: String,
    pub server_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Completed,
    ReportMissing,
    IssueWritingDisabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub repo: String,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_run_id: Option<String>,
    pub previous_available: bool,
    pub ignored_rules: Vec<String>,
    pub alert_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadOutcome>,
    /// Best-effort failures that were logged and did not stop the run.
    pub errors: Vec<String>,
}

impl SyncOutcome {
    pub(crate) fn new(opts: &SyncOptions, status: SyncStatus) -> Self {
        Self {
            status,
            repo: opts.repo.to_string(),
            run_id: opts.run_id.to_string(),
            issue_number: None,
            previous_run_id: None,
            previous_available: false,
            ignored_rules: opts.ignore.clone(),
            alert_count: 0,
            action: None,
            diff: None,
            upload: None,
            errors: vec![],
        }
    }
}

pub struct Engine<'a> {
    tracker: &'a dyn IssueTracker,
    artifacts: &'a dyn ArtifactStore,
    opts: SyncOptions,
}

impl<'a> Engine<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, artifacts: &'a dyn ArtifactStore, opts: SyncOptions) -> Self {
        Self {
            tracker,
            artifacts,
            opts,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.opts
    }

    /// Runs one scan reconciliation. Lookup misses and failed issue mutations
    /// are logged and recorded in [`SyncOutcome::errors`]; only issue search and
    /// comment listing failures abort the run.
    pub fn sync(&self) -> Result<SyncOutcome> {
        let opts = &self.opts;
        let report_path = opts.workspace.join(artifacts::JSON_REPORT);

        if !opts.allow_issue_writing {
            info!("issue writing is disabled; only uploading artifacts");
            let mut outcome = SyncOutcome::new(opts, SyncStatus::IssueWritingDisabled);
            self.upload(&mut outcome);
            return Ok(outcome);
        }

        let mut current = match Report::load(&report_path) {
            Ok(report) => report,
            Err(err) => {
                error!("failed to locate the JSON report generated by the ZAP scan: {err:#}");
                return Ok(SyncOutcome::new(opts, SyncStatus::ReportMissing));
            }
        };
        info!(
            "loaded {} with {} alerts",
            report_path.display(),
            current.site.alerts.len()
        );

        let mut outcome = SyncOutcome::new(opts, SyncStatus::Completed);

        let results = self
            .tracker
            .search_open_issues(&opts.repo, &opts.issue_title)
            .with_context(|| format!("searching open issues in {}", opts.repo))
            .map_err(crate::exit::remote_err)?;
        let tracking = resolve::select_tracking_issue(&results, &opts.bot_login).cloned();

        let previous = match &tracking {
            None => {
                info!("no open tracking issue found");
                Previous::Absent
            }
            Some(issue) => {
                info!("ongoing open issue has been identified #{}", issue.number);
                outcome.issue_number = Some(issue.number);
                self.previous_report(issue, &mut outcome)?
            }
        };
        outcome.previous_available = previous.is_available();

        if !opts.ignore.is_empty() {
            info!(
                "{} rules will be ignored according to the rules configuration",
                opts.ignore.len()
            );
            filter::filter_in_place(&mut current, &opts.ignore);
            current
                .save(&report_path)
                .context("failed to rewrite the filtered report")?;
            info!("the current report is updated with the ignored alerts");
        }

        let has_alerts = current.has_alerts();
        outcome.alert_count = current.site.alerts.len();
        info!("alerts present in the current report: {has_alerts}");

        let delta = diff::diff(&mut current, &previous);
        let action = resolve::resolve(&ResolveInput {
            issue: TrackedState::of(tracking.as_ref()),
            previous_available: previous.is_available(),
            has_alerts,
            updated: current.updated,
        });
        info!("decision: {action:?}");

        self.apply(action, tracking.as_ref(), &current, &previous, &delta, &mut outcome);
        outcome.action = Some(action);
        outcome.diff = Some(delta);

        self.upload(&mut outcome);
        Ok(outcome)
    }

    fn previous_report(&self, issue: &Issue, outcome: &mut SyncOutcome) -> Result<Previous> {
        let opts = &self.opts;
        let comments = if issue.comments == 0 {
            vec![]
        } else {
            self.tracker
                .list_comments(&opts.repo, issue.number)
                .with_context(|| format!("listing comments of issue #{}", issue.number))
                .map_err(crate::exit::remote_err)?
        };

        let Some(run_id) = resolve::previous_run_id(issue, &comments, &opts.bot_login) else {
            warn!(
                "no run id found on issue #{}; treating previous report as unavailable",
                issue.number
            );
            return Ok(Previous::Absent);
        };
        info!("previous run id: {run_id}");
        outcome.previous_run_id = Some(run_id.to_string());

        match self
            .artifacts
            .fetch_report(&opts.repo, &run_id, &opts.artifact_name)
        {
            Ok(report) => Ok(Previous::Present(report)),
            Err(err) => {
                warn!("failed to fetch the previous report of run {run_id}: {err:#}");
                outcome
                    .errors
                    .push(format!("fetch previous report (run {run_id}): {err:#}"));
                Ok(Previous::Absent)
            }
        }
    }

    fn apply(
        &self,
        action: Action,
        tracking: Option<&Issue>,
        current: &Report,
        previous: &Previous,
        delta: &DiffResult,
        outcome: &mut SyncOutcome,
    ) {
        let opts = &self.opts;
        let context_line = opts.run_id.context_line();
        let link_line = compose::link_line(
            &opts.server_url,
            &opts.repo.owner,
            &opts.repo.repo,
            opts.run_id.as_str(),
        );

        match (action, tracking) {
            (Action::CloseWithComment, Some(issue)) => {
                info!("starting to close the issue #{}", issue.number);
                let result = self
                    .tracker
                    .create_comment(&opts.repo, issue.number, CLOSE_COMMENT)
                    .and_then(|()| self.tracker.close_issue(&opts.repo, issue.number));
                match result {
                    Ok(()) => info!("successfully closed the issue #{}", issue.number),
                    Err(err) => {
                        error!("error occurred while closing the issue with a comment: {err:#}");
                        outcome
                            .errors
                            .push(format!("close issue #{}: {err:#}", issue.number));
                    }
                }
            }
            (Action::CreateIssue, _) => {
                let body = compose::compose(Content::Site(&current.site), &context_line, &link_line);
                match self
                    .tracker
                    .create_issue(&opts.repo, &opts.issue_title, &body)
                {
                    Ok(number) => {
                        info!("a new issue #{number} has been created for the ZAP scan");
                        outcome.issue_number = Some(number);
                    }
                    Err(err) => {
                        error!("error occurred while creating the issue: {err:#}");
                        outcome.errors.push(format!("create issue: {err:#}"));
                    }
                }
            }
            (Action::CommentUpdate, Some(issue)) => {
                info!("the current report has changes compared to the previous report");
                let empty = Site::default();
                let previous_site = previous.report().map(|r| &r.site).unwrap_or(&empty);
                let body = compose::compose(
                    Content::Diff {
                        diff: delta,
                        current: &current.site,
                        previous: previous_site,
                    },
                    &context_line,
                    &link_line,
                );
                match self.tracker.create_comment(&opts.repo, issue.number, &body) {
                    Ok(()) => info!(
                        "the issue #{} has been updated with the latest ZAP scan results",
                        issue.number
                    ),
                    Err(err) => {
                        error!(
                            "error occurred while updating the issue #{} with the latest ZAP scan: {err:#}",
                            issue.number
                        );
                        outcome
                            .errors
                            .push(format!("comment on issue #{}: {err:#}", issue.number));
                    }
                }
            }
            (Action::NoOp { reason }, _) => {
                info!("nothing to do on the tracking issue ({reason:?})");
            }
            (Action::CloseWithComment | Action::CommentUpdate, None) => {
                warn!("decision {action:?} needs a tracking issue but none was found");
            }
        }
    }

    fn upload(&self, outcome: &mut SyncOutcome) {
        let opts = &self.opts;
        let files = artifacts::report_files(&opts.workspace);
        match self
            .artifacts
            .upload(&opts.repo, &opts.run_id, &opts.artifact_name, &files)
        {
            Ok(upload) => {
                for missing in &upload.skipped_missing {
                    warn!("artifact file not found, skipped: {missing}");
                }
                info!(
                    "uploaded {} files as artifact {:?} to {}",
                    upload.uploaded.len(),
                    opts.artifact_name,
                    upload.destination
                );
                outcome.upload = Some(upload);
            }
            Err(err) => {
                error!("failed to upload artifacts: {err:#}");
                outcome.errors.push(format!("upload artifacts: {err:#}"));
            }
        }
    }
}
