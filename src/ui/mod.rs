use anyhow::Error;
use std::io::{self, Write};

use crate::diff::DiffResult;
use crate::engine::{SyncOutcome, SyncStatus};
use crate::resolve::{Action, NoOpReason};

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` (or RUST_LOG=debug) for details");
    let _ = writeln!(stderr, "  - see `zaptrack --help` for commands and options");
}

pub fn print_outcome(outcome: &SyncOutcome, quiet: bool) {
    if quiet {
        return;
    }

    let mut out = io::stdout().lock();
    match outcome.status {
        SyncStatus::ReportMissing => {
            let _ = writeln!(out, "no ZAP JSON report found; nothing was done");
            return;
        }
        SyncStatus::IssueWritingDisabled => {
            let _ = writeln!(out, "issue writing disabled; artifacts only");
        }
        SyncStatus::Completed => {
            let _ = writeln!(
                out,
                "{}: run {} alerts={}",
                outcome.repo, outcome.run_id, outcome.alert_count
            );
            if let Some(action) = outcome.action {
                let _ = writeln!(out, "decision: {}", describe_action(action, outcome.issue_number));
            }
            if let Some(prev) = &outcome.previous_run_id {
                let state = if outcome.previous_available {
                    "available"
                } else {
                    "unavailable"
                };
                let _ = writeln!(out, "previous run: {prev} ({state})");
            }
            if let Some(diff) = &outcome.diff {
                let _ = writeln!(out, "changes: {}", summarize_diff(diff));
            }
        }
    }

    if let Some(upload) = &outcome.upload {
        let _ = writeln!(
            out,
            "artifact: {} file(s) -> {}",
            upload.uploaded.len(),
            upload.destination
        );
    }
    if !outcome.errors.is_empty() {
        let _ = writeln!(out, "warnings ({}):", outcome.errors.len());
        for e in &outcome.errors {
            let _ = writeln!(out, "  - {e}");
        }
    }
}

pub fn describe_action(action: Action, issue_number: Option<u64>) -> String {
    let issue = issue_number
        .map(|n| format!(" #{n}"))
        .unwrap_or_default();
    match action {
        Action::CloseWithComment => format!("close issue{issue}"),
        Action::CreateIssue => format!("create issue{issue}"),
        Action::CommentUpdate => format!("comment on issue{issue}"),
        Action::NoOp {
            reason: NoOpReason::NothingToReport,
        } => "no-op (no alerts, no open issue)".to_string(),
        Action::NoOp {
            reason: NoOpReason::Unchanged,
        } => format!("no-op (unchanged since last report on issue{issue})"),
    }
}

pub fn summarize_diff(diff: &DiffResult) -> String {
    format!(
        "new={} resolved={} changed={}",
        diff.new_alerts.len(),
        diff.resolved_alerts.len(),
        diff.changed_counts.len()
    )
}
