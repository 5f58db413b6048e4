use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::engine::SyncOutcome;

pub const RUN_LOG_FILE: &str = "zaptrack_run.json";

#[derive(Debug, Serialize)]
pub struct RunRecord<'a> {
    schema_version: &'static str,
    tool_version: &'static str,
    command: &'static str,
    started_at: String,
    finished_at: String,
    #[serde(flatten)]
    outcome: &'a SyncOutcome,
}

pub fn run_record(
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    outcome: &SyncOutcome,
) -> RunRecord<'_> {
    RunRecord {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION"),
        command: "sync",
        started_at: format_ts(started_at),
        finished_at: format_ts(finished_at),
        outcome,
    }
}

pub fn write_run_log(workspace: &Path, record: &RunRecord<'_>) -> Result<PathBuf> {
    let path = workspace.join(RUN_LOG_FILE);
    let buf = serde_json::to_vec_pretty(record).context("failed to serialize run log")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write run log: {}", path.display()))?;
    Ok(path)
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

/// Installs the stderr `tracing` subscriber. `RUST_LOG` wins over the flags.
pub fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();

    tracing::debug!("logging initialized at level: {level}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SyncOptions, SyncStatus};
    use crate::resolve::Action;
    use crate::runner_id::RunId;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn run_log_flattens_outcome_next_to_timestamps() {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let workspace =
            std::env::temp_dir().join(format!("zaptrack-log-test-{}-{seq}", std::process::id()));
        let _ = std::fs::remove_dir_all(&workspace);
        std::fs::create_dir_all(&workspace).expect("create workspace");

        let opts = SyncOptions {
            workspace: workspace.clone(),
            ignore: vec!["10038".to_string()],
            run_id: RunId::new("5").expect("run id"),
            issue_title: "ZAP".to_string(),
            repo: "octo/app".parse().expect("repo"),
            allow_issue_writing: true,
            artifact_name: "zap_scan".to_string(),
            bot_login: "bot".to_string(),
            server_url: "https://github.com".to_string(),
        };
        let mut outcome = SyncOutcome::new(&opts, SyncStatus::Completed);
        outcome.action = Some(Action::CreateIssue);

        let started_at = OffsetDateTime::UNIX_EPOCH;
        let record = run_record(started_at, started_at, &outcome);
        let path = write_run_log(&workspace, &record).expect("write log");

        let v: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read log")).expect("parse log");
        assert_eq!(v.get("command").and_then(|c| c.as_str()), Some("sync"));
        assert_eq!(v.get("started_at").and_then(|c| c.as_str()), Some("1970-01-01T00:00:00Z"));
        assert_eq!(v.get("status").and_then(|c| c.as_str()), Some("completed"));
        assert_eq!(
            v.get("action").and_then(|a| a.get("action")).and_then(|a| a.as_str()),
            Some("create_issue")
        );
        assert_eq!(v.get("repo").and_then(|c| c.as_str()), Some("octo/app"));

        let _ = std::fs::remove_dir_all(&workspace);
    }
}
