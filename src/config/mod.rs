use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::artifacts::DEFAULT_ARTIFACT_NAME;
use crate::github::{DEFAULT_API_URL, DEFAULT_SERVER_URL};

pub const DEFAULT_ISSUE_TITLE: &str = "ZAP Scan Baseline Report";
pub const DEFAULT_BOT_LOGIN: &str = "github-actions[bot]";

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub issue: IssueConfig,
    pub artifact: ArtifactConfig,
    pub rules: RulesConfig,
    pub github: GitHubConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueConfig {
    pub title: String,
    pub writing: bool,
    pub bot_login: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RulesConfig {
    pub ignore: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitHubConfig {
    pub api_url: String,
    pub server_url: String,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            issue: IssueConfig {
                title: DEFAULT_ISSUE_TITLE.to_string(),
                writing: true,
                bot_login: DEFAULT_BOT_LOGIN.to_string(),
            },
            artifact: ArtifactConfig {
                name: DEFAULT_ARTIFACT_NAME.to_string(),
                dir: None,
            },
            rules: RulesConfig {
                ignore: vec![],
                file: None,
            },
            github: GitHubConfig {
                api_url: DEFAULT_API_URL.to_string(),
                server_url: DEFAULT_SERVER_URL.to_string(),
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    issue: Option<RawIssueConfig>,
    artifact: Option<RawArtifactConfig>,
    rules: Option<RawRulesConfig>,
    github: Option<RawGitHubConfig>,
}

#[derive(Debug, Deserialize)]
struct RawIssueConfig {
    title: Option<String>,
    writing: Option<bool>,
    bot_login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawArtifactConfig {
    name: Option<String>,
    dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRulesConfig {
    ignore: Option<Vec<String>>,
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGitHubConfig {
    api_url: Option<String>,
    server_url: Option<String>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/zaptrack/config.toml")
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Defaults, then the TOML file (explicit path or `~/.config/zaptrack/config.toml`
/// when present), then `ZAPTRACK_*` environment overrides. CLI flags are
/// applied on top by the caller.
pub fn load(config_path: Option<&Path>, home_dir: Option<&Path>) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .or_else(|| home_dir.map(default_config_path));

    if let Some(path) = path {
        if config_path.is_some() && !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        if path.exists() {
            let s = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let raw: RawConfig = toml::from_str(&s).context("failed to parse config file (TOML)")?;
            apply_raw_config(&mut cfg, raw);
            cfg.config_path = Some(path.display().to_string());
        }
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(issue) = raw.issue {
        if let Some(title) = issue.title {
            cfg.issue.title = title;
        }
        if let Some(writing) = issue.writing {
            cfg.issue.writing = writing;
        }
        if let Some(bot_login) = issue.bot_login {
            cfg.issue.bot_login = bot_login;
        }
    }

    if let Some(artifact) = raw.artifact {
        if let Some(name) = artifact.name {
            cfg.artifact.name = name;
        }
        if artifact.dir.is_some() {
            cfg.artifact.dir = artifact.dir;
        }
    }

    if let Some(rules) = raw.rules {
        if let Some(ignore) = rules.ignore {
            cfg.rules.ignore = ignore;
        }
        if rules.file.is_some() {
            cfg.rules.file = rules.file;
        }
    }

    if let Some(github) = raw.github {
        if let Some(api_url) = github.api_url {
            cfg.github.api_url = api_url;
        }
        if let Some(server_url) = github.server_url {
            cfg.github.server_url = server_url;
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    let v = std::env::var(key).ok()?;
    let v = v.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Some(v) = non_empty_env("ZAPTRACK_ISSUE_TITLE") {
        cfg.issue.title = v;
    }
    if let Ok(v) = std::env::var("ZAPTRACK_ISSUE_WRITING") {
        cfg.issue.writing = parse_bool(&v).with_context(|| "ZAPTRACK_ISSUE_WRITING")?;
    }
    if let Some(v) = non_empty_env("ZAPTRACK_BOT_LOGIN") {
        cfg.issue.bot_login = v;
    }
    if let Some(v) = non_empty_env("ZAPTRACK_ARTIFACT_NAME") {
        cfg.artifact.name = v;
    }
    if let Some(v) = non_empty_env("ZAPTRACK_ARTIFACT_DIR") {
        cfg.artifact.dir = Some(v);
    }
    if let Ok(v) = std::env::var("ZAPTRACK_RULES_IGNORE") {
        let parts = crate::filter::split_ids(&[v]);
        if !parts.is_empty() {
            cfg.rules.ignore = parts;
        }
    }
    if let Some(v) = non_empty_env("ZAPTRACK_RULES_FILE") {
        cfg.rules.file = Some(v);
    }
    if let Some(v) = non_empty_env("GITHUB_API_URL") {
        cfg.github.api_url = v;
    }
    if let Some(v) = non_empty_env("GITHUB_SERVER_URL") {
        cfg.github.server_url = v;
    }

    Ok(())
}

pub fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
