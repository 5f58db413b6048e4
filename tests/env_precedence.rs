use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

fn base_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_zaptrack"));
    cmd.env("HOME", home);
    for key in [
        "ZAPTRACK_CONFIG",
        "ZAPTRACK_ISSUE_TITLE",
        "ZAPTRACK_ISSUE_WRITING",
        "ZAPTRACK_BOT_LOGIN",
        "ZAPTRACK_ARTIFACT_NAME",
        "ZAPTRACK_ARTIFACT_DIR",
        "ZAPTRACK_RULES_IGNORE",
        "ZAPTRACK_RULES_FILE",
        "GITHUB_API_URL",
        "GITHUB_SERVER_URL",
        "GITHUB_TOKEN",
        "GITHUB_RUN_ID",
        "GITHUB_REPOSITORY",
        "GITHUB_WORKSPACE",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("zaptrack-env-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

const REPORT: &[u8] = br#"{"@version":"2.14.0","@generated":"Mon, 1 Jan 2024 00:00:00","site":[{"@name":"https://example.com","alerts":[
    {"pluginid":"40018","name":"SQL Injection","riskcode":"3","count":"1",
     "instances":[{"uri":"https://example.com/login","method":"POST","evidence":"' OR 1=1"}]}]}]}"#;

#[test]
fn env_overrides_config_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/zaptrack/config.toml").as_path(),
        br#"
[issue]
title = "From file"
writing = true

[artifact]
name = "from_file"
"#,
    );

    let out = {
        let mut cmd = base_cmd(&home);
        cmd.env("ZAPTRACK_ISSUE_TITLE", "From env");
        cmd.env("ZAPTRACK_ISSUE_WRITING", "off");
        cmd.env("ZAPTRACK_RULES_IGNORE", "10038, 10096");
        cmd.args(["config", "--show", "--json"]);
        cmd.output().expect("run zaptrack")
    };
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v.pointer("/issue/title").and_then(|t| t.as_str()), Some("From env"));
    assert_eq!(v.pointer("/issue/writing").and_then(|w| w.as_bool()), Some(false));
    assert_eq!(
        v.pointer("/artifact/name").and_then(|n| n.as_str()),
        Some("from_file")
    );
    assert_eq!(
        v.pointer("/rules/ignore"),
        Some(&serde_json::json!(["10038", "10096"]))
    );

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_bool_exits_2() {
    let home = make_temp_home();
    let out = base_cmd(&home)
        .env("ZAPTRACK_ISSUE_WRITING", "perhaps")
        .args(["config", "--show"])
        .output()
        .expect("run zaptrack");
    assert_eq!(out.status.code(), Some(2));

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn zaptrack_config_env_points_at_file() {
    let home = make_temp_home();
    let cfg = home.join("custom.toml");
    write_file(&cfg, b"[issue]\nbot_login = \"zap-bot\"\n");

    let out = base_cmd(&home)
        .env("ZAPTRACK_CONFIG", &cfg)
        .args(["config", "--show", "--json"])
        .output()
        .expect("run zaptrack");
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v.pointer("/issue/bot_login").and_then(|b| b.as_str()), Some("zap-bot"));

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn github_env_drives_artifact_only_sync() {
    let home = make_temp_home();
    let workspace = home.join("ws");
    let store = home.join("store");
    write_file(&workspace.join("report_json.json"), REPORT);
    write_file(&workspace.join("report_md.md"), b"# report");

    let out = base_cmd(&home)
        .env("GITHUB_WORKSPACE", &workspace)
        .env("GITHUB_RUN_ID", "4242")
        .env("GITHUB_REPOSITORY", "octo/app")
        .env("ZAPTRACK_ARTIFACT_DIR", &store)
        .args(["sync", "--allow-issue-writing", "false", "--json", "--run-log"])
        .output()
        .expect("run zaptrack");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        v.get("status").and_then(|s| s.as_str()),
        Some("issue_writing_disabled")
    );
    assert_eq!(v.get("run_id").and_then(|s| s.as_str()), Some("4242"));
    let uploaded = v
        .pointer("/upload/uploaded")
        .and_then(|u| u.as_array())
        .expect("uploaded array");
    assert_eq!(uploaded.len(), 2);
    assert!(store.join("4242/zap_scan/report_json.json").is_file());
    assert!(store.join("4242/zap_scan/report_md.md").is_file());
    assert!(workspace.join("zaptrack_run.json").is_file());

    let _ = std::fs::remove_dir_all(&home);
}
