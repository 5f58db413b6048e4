use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::artifacts::{ArtifactStore, DirArtifactStore};
use crate::compose::{self, Content};
use crate::config::EffectiveConfig;
use crate::core::{Previous, Report};
use crate::diff::DiffResult;
use crate::engine::{Engine, SyncOptions};
use crate::github::GitHubClient;
use crate::runner_id::RunId;
use crate::tracker::RepoRef;

#[derive(Debug, Parser)]
#[command(
    name = "zaptrack",
    version,
    about = "Reconcile OWASP ZAP scan reports with a GitHub tracking issue"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// HTTP timeout in seconds for each GitHub request.
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile the workspace report with the tracking issue and upload artifacts.
    Sync(SyncArgs),
    /// Compare two report files offline.
    Diff(DiffArgs),
    /// Remove ignored rules from a report file.
    Filter(FilterArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[arg(long)]
    pub token: Option<String>,
    #[arg(long)]
    pub workspace: Option<PathBuf>,
    /// Rule id to ignore; repeatable, comma separated values accepted.
    #[arg(long)]
    pub ignore: Vec<String>,
    #[arg(long)]
    pub rules_file: Option<PathBuf>,
    #[arg(long)]
    pub run_id: Option<String>,
    #[arg(long)]
    pub issue_title: Option<String>,
    /// Repository as `owner/repo`.
    #[arg(long)]
    pub repo: Option<String>,
    #[arg(long, value_parser = parse_bool_arg)]
    pub allow_issue_writing: Option<bool>,
    #[arg(long)]
    pub artifact_name: Option<String>,
    /// Use a local artifact store instead of GitHub.
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,
    #[arg(long)]
    pub bot_login: Option<String>,
    /// Write a JSON run record into the workspace.
    #[arg(long)]
    pub run_log: bool,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    #[arg(long)]
    pub current: PathBuf,
    #[arg(long)]
    pub previous: Option<PathBuf>,
    #[arg(long)]
    pub ignore: Vec<String>,
    #[arg(long)]
    pub rules_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub report: PathBuf,
    #[arg(long)]
    pub ignore: Vec<String>,
    #[arg(long)]
    pub rules_file: Option<PathBuf>,
    /// Rewrite the report file instead of printing the result.
    #[arg(long)]
    pub in_place: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Serialize)]
struct DiffOutput<'a> {
    updated: bool,
    #[serde(flatten)]
    diff: &'a DiffResult,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logs::init_tracing(cli.verbose, cli.quiet);

    let home_dir = crate::config::home_dir();
    let env_config_path = std::env::var_os("ZAPTRACK_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        home_dir.as_deref(),
    )
    .map_err(crate::exit::invalid_args_err)?;

    let globals = cli_globals(&cli);
    match cli.command {
        Commands::Sync(args) => run_sync(&globals, &cfg, args)?,
        Commands::Diff(args) => {
            let ignore = effective_ignore(&cfg, &args.ignore, args.rules_file.as_deref())?;
            let mut current = Report::load(&args.current).map_err(crate::exit::invalid_args_err)?;
            crate::filter::filter_in_place(&mut current, &ignore);
            let previous = match &args.previous {
                Some(path) => {
                    Previous::Present(Report::load(path).map_err(crate::exit::invalid_args_err)?)
                }
                None => Previous::Absent,
            };
            let delta = crate::diff::diff(&mut current, &previous);
            if cli.json {
                write_json(&DiffOutput {
                    updated: current.updated,
                    diff: &delta,
                })?;
            } else if !cli.quiet {
                let context_line = format!(
                    "updated: {} ({})",
                    current.updated,
                    crate::ui::summarize_diff(&delta)
                );
                let link_line = format!("current: {}", args.current.display());
                let content = match previous.report() {
                    Some(prev) => Content::Diff {
                        diff: &delta,
                        current: &current.site,
                        previous: &prev.site,
                    },
                    None => Content::Site(&current.site),
                };
                print!("{}", compose::compose(content, &context_line, &link_line));
            }
        }
        Commands::Filter(args) => {
            let ignore = effective_ignore(&cfg, &args.ignore, args.rules_file.as_deref())?;
            let report = Report::load(&args.report).map_err(crate::exit::invalid_args_err)?;
            let filtered = crate::filter::filter(&report, &ignore);
            if args.in_place {
                filtered.save(&args.report)?;
                tracing::info!(
                    "removed {} alerts from {}",
                    report.site.alerts.len() - filtered.site.alerts.len(),
                    args.report.display()
                );
            } else {
                write_json(&filtered)?;
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "zaptrack", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    let stdout = std::io::stdout();
                    serde_json::to_writer_pretty(stdout.lock(), &cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !cli.quiet {
                eprintln!("config: use `zaptrack config --show`");
            }
        }
    }

    Ok(())
}

struct Globals {
    json: bool,
    quiet: bool,
    timeout: Duration,
}

fn cli_globals(cli: &Cli) -> Globals {
    Globals {
        json: cli.json,
        quiet: cli.quiet,
        timeout: Duration::from_secs(cli.timeout),
    }
}

fn run_sync(globals: &Globals, cfg: &EffectiveConfig, args: SyncArgs) -> Result<()> {
    let workspace = args
        .workspace
        .or_else(|| std::env::var_os("GITHUB_WORKSPACE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let ignore = effective_ignore(cfg, &args.ignore, args.rules_file.as_deref())?;

    let run_id = args
        .run_id
        .or_else(|| env_value("GITHUB_RUN_ID"))
        .ok_or_else(|| crate::exit::invalid_args("sync: --run-id (or GITHUB_RUN_ID) is required"))?;
    let run_id = RunId::new(run_id.trim()).ok_or_else(|| {
        crate::exit::invalid_args(format!("sync: invalid run id: {run_id:?}"))
    })?;

    let repo = args
        .repo
        .or_else(|| env_value("GITHUB_REPOSITORY"))
        .ok_or_else(|| crate::exit::invalid_args("sync: --repo (or GITHUB_REPOSITORY) is required"))?;
    let repo: RepoRef = repo
        .parse()
        .map_err(|e: String| crate::exit::invalid_args(format!("sync: {e}")))?;

    let allow_issue_writing = args.allow_issue_writing.unwrap_or(cfg.issue.writing);
    let token = args.token.or_else(|| env_value("GITHUB_TOKEN"));
    if allow_issue_writing && token.is_none() {
        return Err(crate::exit::invalid_args(
            "sync: --token (or GITHUB_TOKEN) is required when issue writing is enabled",
        ));
    }

    let artifact_dir = args
        .artifact_dir
        .or_else(|| cfg.artifact.dir.as_ref().map(PathBuf::from));

    let client = GitHubClient::new(
        &cfg.github.api_url,
        token.as_deref().unwrap_or_default(),
        workspace.clone(),
        globals.timeout,
    )?;
    let dir_store = artifact_dir.map(DirArtifactStore::new);
    let store: &dyn ArtifactStore = match &dir_store {
        Some(store) => store,
        None => &client,
    };

    let opts = SyncOptions {
        workspace: workspace.clone(),
        ignore,
        run_id,
        issue_title: args.issue_title.unwrap_or_else(|| cfg.issue.title.clone()),
        repo,
        allow_issue_writing,
        artifact_name: args
            .artifact_name
            .unwrap_or_else(|| cfg.artifact.name.clone()),
        bot_login: args.bot_login.unwrap_or_else(|| cfg.issue.bot_login.clone()),
        server_url: cfg.github.server_url.clone(),
    };

    let started_at = time::OffsetDateTime::now_utc();
    let outcome = Engine::new(&client, store, opts).sync()?;
    let finished_at = time::OffsetDateTime::now_utc();
    let record = crate::logs::run_record(started_at, finished_at, &outcome);

    if args.run_log {
        let path = crate::logs::write_run_log(&workspace, &record)?;
        tracing::info!("run log written to {}", path.display());
    }
    if globals.json {
        write_json(&record)?;
    } else {
        crate::ui::print_outcome(&outcome, globals.quiet);
    }
    Ok(())
}

/// CLI ids replace configured ids; rules-file ids are appended.
fn effective_ignore(
    cfg: &EffectiveConfig,
    cli_ignore: &[String],
    cli_rules_file: Option<&Path>,
) -> Result<Vec<String>> {
    let mut ids = crate::filter::split_ids(cli_ignore);
    if ids.is_empty() {
        ids = crate::filter::split_ids(&cfg.rules.ignore);
    }

    let rules_file = cli_rules_file
        .map(ToOwned::to_owned)
        .or_else(|| cfg.rules.file.as_ref().map(PathBuf::from));
    if let Some(path) = rules_file {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read rules file: {}", path.display()))
            .map_err(crate::exit::invalid_args_err)?;
        ids.extend(crate::filter::parse_rules_file(&text));
    }

    Ok(crate::filter::dedup_preserving_order(ids))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool_arg(s: &str) -> std::result::Result<bool, String> {
    crate::config::parse_bool(s).map_err(|e| e.to_string())
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
