use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("dwell/data.db")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("dwell");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }

    /// An executable path that exists, so the app counts as installed.
    fn installed_app(&self, name: &str) -> String {
        let path = self.home.join(name);
        fs::write(&path, b"#!/bin/sh\n").expect("failed to write fake app");
        path.to_string_lossy().into_owned()
    }
}

fn run_dwell(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("dwell"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env("LANG", "en_US.UTF-8")
        .env_remove("LC_ALL")
        .env_remove("LC_MESSAGES")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute dwell: {e}"))
}

fn assert_success(args: &[&str], output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return stdout;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "dwell {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn dwell_ok(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run_dwell(env, args);
    assert_success(args, &output)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_millis() as i64
}

#[test]
fn record_then_today_hides_uninstalled_apps() {
    let env = CliTestEnv::new();
    let editor = env.installed_app("editor");
    let now = now_millis();
    let focus = (now - 5_000).to_string();
    let blur = (now - 2_000).to_string();

    let stdout = dwell_ok(&env, &["record", &editor, &focus, &blur]);
    assert!(stdout.contains("Recorded 3s for editor"), "got:\n{stdout}");
    dwell_ok(
        &env,
        &[
            "record",
            "/nonexistent/dwell-cli-test/game",
            &focus,
            &blur,
            "--name",
            "Old Game",
        ],
    );
    assert!(env.db_path().exists(), "database should be created");

    let stdout = dwell_ok(&env, &["today"]);
    assert!(stdout.contains("editor"), "got:\n{stdout}");
    assert!(!stdout.contains("Old Game"), "got:\n{stdout}");

    let stdout = dwell_ok(&env, &["today", "--all"]);
    assert!(stdout.contains("Old Game"), "got:\n{stdout}");
    assert!(stdout.contains("(uninstalled)"), "got:\n{stdout}");

    let stdout = dwell_ok(&env, &["today", "--all", "--json"]);
    let rows: serde_json::Value = serde_json::from_str(&stdout).expect("today --json is JSON");
    assert_eq!(rows.as_array().map(Vec::len), Some(2));
    assert_eq!(rows[0]["durationMillis"], 3_000);

    let stdout = dwell_ok(&env, &["apps"]);
    assert!(stdout.contains("editor"), "got:\n{stdout}");
    assert!(stdout.contains("Old Game"), "got:\n{stdout}");
}

#[test]
fn record_rejects_inverted_interval() {
    let env = CliTestEnv::new();

    let output = run_dwell(&env, &["record", "/usr/bin/true", "2000", "1000"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("before focus_at"), "got:\n{stderr}");
}

#[test]
fn year_on_empty_database() {
    let env = CliTestEnv::new();

    let stdout = dwell_ok(&env, &["year"]);
    assert!(stdout.contains("No usage recorded this year."), "got:\n{stdout}");
}

#[test]
fn config_changes_persist_between_runs() {
    let env = CliTestEnv::new();

    let stdout = dwell_ok(&env, &["config", "show"]);
    let shown: serde_json::Value = serde_json::from_str(&stdout).expect("config show is JSON");
    assert_eq!(shown["config"]["lang"], "system");
    assert_eq!(shown["derived"]["effectiveLang"], "en");
    assert_eq!(shown["derived"]["effectiveTheme"], "light");

    dwell_ok(&env, &["config", "set", "firstDayOfWeek", "6"]);
    dwell_ok(&env, &["menu", "theme_dark"]);
    let stdout = dwell_ok(&env, &["menu", "theme_dark"]);
    assert!(stdout.contains("already active"), "got:\n{stdout}");

    let stdout = dwell_ok(&env, &["config", "show"]);
    let shown: serde_json::Value = serde_json::from_str(&stdout).expect("config show is JSON");
    assert_eq!(shown["config"]["firstDayOfWeek"], 6);
    assert_eq!(shown["config"]["theme"], "dark");
    assert_eq!(shown["derived"]["effectiveTheme"], "dark");
}

#[test]
fn invalid_settings_are_rejected() {
    let env = CliTestEnv::new();

    let output = run_dwell(&env, &["config", "set", "firstDayOfWeek", "9"]);
    assert!(!output.status.success());

    let output = run_dwell(&env, &["config", "set", "volume", "11"]);
    assert!(!output.status.success());

    let output = run_dwell(&env, &["menu", "quit"]);
    assert!(!output.status.success());
}

#[test]
fn platform_overrides_drive_system_settings() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[platform]
locale = "zh_CN.UTF-8"
color_scheme = "dark"
auto_start = true
"#,
    );

    let stdout = dwell_ok(&env, &["config", "show"]);
    let shown: serde_json::Value = serde_json::from_str(&stdout).expect("config show is JSON");
    assert_eq!(shown["derived"]["effectiveLang"], "zh");
    assert_eq!(shown["derived"]["effectiveTheme"], "dark");
    assert_eq!(shown["derived"]["autoStart"], true);

    dwell_ok(&env, &["menu", "lang_en"]);
    let stdout = dwell_ok(&env, &["config", "show"]);
    let shown: serde_json::Value = serde_json::from_str(&stdout).expect("config show is JSON");
    assert_eq!(shown["derived"]["effectiveLang"], "en");
}
