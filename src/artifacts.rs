use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::Report;
use crate::runner_id::RunId;
use crate::tracker::RepoRef;

pub const JSON_REPORT: &str = "report_json.json";
pub const MD_REPORT: &str = "report_md.md";
pub const HTML_REPORT: &str = "report_html.html";
pub const DEFAULT_ARTIFACT_NAME: &str = "zap_scan";

/// The report files of a workspace that make up one artifact.
pub fn report_files(workspace: &Path) -> Vec<PathBuf> {
    [MD_REPORT, JSON_REPORT, HTML_REPORT]
        .iter()
        .map(|name| workspace.join(name))
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadOutcome {
    pub destination: String,
    pub uploaded: Vec<String>,
    pub skipped_missing: Vec<String>,
}

pub trait ArtifactStore {
    /// Reads the JSON report stored in the artifact `name` of run `run_id`.
    fn fetch_report(&self, repo: &RepoRef, run_id: &RunId, name: &str) -> Result<Report>;

    fn upload(
        &self,
        repo: &RepoRef,
        run_id: &RunId,
        name: &str,
        files: &[PathBuf],
    ) -> Result<UploadOutcome>;
}

/// Artifacts kept on local disk at `<root>/<run_id>/<name>/<file>`.
#[derive(Debug, Clone)]
pub struct DirArtifactStore {
    root: PathBuf,
}

impl DirArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_dir(&self, run_id: &RunId, name: &str) -> PathBuf {
        self.root.join(run_id.as_str()).join(name)
    }
}

impl ArtifactStore for DirArtifactStore {
    fn fetch_report(&self, _repo: &RepoRef, run_id: &RunId, name: &str) -> Result<Report> {
        let path = self.artifact_dir(run_id, name).join(JSON_REPORT);
        Report::load(&path)
    }

    fn upload(
        &self,
        _repo: &RepoRef,
        run_id: &RunId,
        name: &str,
        files: &[PathBuf],
    ) -> Result<UploadOutcome> {
        copy_into(&self.artifact_dir(run_id, name), files)
    }
}

/// Copies the existing `files` into `dir`; missing files are reported, not
/// treated as errors.
pub fn copy_into(dir: &Path, files: &[PathBuf]) -> Result<UploadOutcome> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact directory: {}", dir.display()))?;

    let mut outcome = UploadOutcome {
        destination: dir.display().to_string(),
        ..UploadOutcome::default()
    };
    for file in files {
        let Some(file_name) = file.file_name() else {
            continue;
        };
        if !file.is_file() {
            outcome.skipped_missing.push(file.display().to_string());
            continue;
        }
        let dest = dir.join(file_name);
        std::fs::copy(file, &dest).with_context(|| {
            format!("failed to copy {} to {}", file.display(), dest.display())
        })?;
        outcome.uploaded.push(file_name.to_string_lossy().to_string());
    }
    Ok(outcome)
}
