//! dwell - desktop app usage from the command line
//!
//! Records focus intervals into the local recorder database and prints
//! today's per-app usage, the per-day summary for the current year, the app
//! list and the user settings.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/dwell/data.db (~/.local/share/dwell/data.db)
//! - Config: $XDG_CONFIG_HOME/dwell/config.toml (~/.config/dwell/config.toml)
//! - Logs: $XDG_STATE_HOME/dwell/dwell.log (~/.local/state/dwell/dwell.log)

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use dwell_core::format::{format_duration, format_with_pattern};
use dwell_core::time::{self, Clock};
use dwell_core::{
    AppState, Config, ConfigUpdate, Database, FocusInterval, LocalBackend, MenuCommand,
    SqliteDetailStore, SystemClock, SystemPlatform,
};

#[derive(Parser)]
#[command(name = "dwell")]
#[command(about = "Desktop app usage summaries")]
#[command(version)]
struct Args {
    /// Echo log events to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append a focus interval for an application
    Record {
        /// Executable path identifying the application
        path: String,
        /// Focus timestamp (ms since epoch)
        focus_at: i64,
        /// Blur timestamp (ms since epoch)
        blur_at: i64,
        /// Display name (default: file name of the path)
        #[arg(long)]
        name: Option<String>,
    },

    /// Show today's usage per application
    Today {
        /// Include applications that are no longer installed
        #[arg(long)]
        all: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show usage per day for the current year
    Year {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List known applications
    Apps,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Apply a menu item such as lang_zh or theme_dark
    Menu {
        /// Menu item id
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print stored and effective settings
    Show,

    /// Change one setting, e.g. `firstDayOfWeek 6`
    Set { field: String, value: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = dwell_core::logging::init(&config.logging, args.verbose)
        .context("failed to initialize logging")?;

    let db_path = config.database_path();
    let db = Arc::new(Database::open(&db_path).context("failed to open database")?);
    db.migrate().context("failed to run migrations")?;

    let state = open_state(&config, db.clone()).await?;
    let status = state.config().persist_status();
    let result = run(&state, db, args.command).await;
    state.shutdown().await;

    result?;
    if let Some(err) = status.borrow().last_error.clone() {
        anyhow::bail!("failed to save settings: {}", err);
    }
    Ok(())
}

async fn open_state(config: &Config, db: Arc<Database>) -> Result<AppState> {
    // No UI shell here; the sender side is simply dropped.
    let (_events, rx) = tokio::sync::mpsc::unbounded_channel();

    AppState::init(
        Arc::new(LocalBackend::new(db.clone())),
        Arc::new(SqliteDetailStore::new(db)),
        &SystemPlatform::new(config.platform.clone()),
        Arc::new(SystemClock),
        rx,
    )
    .await
    .context("failed to load settings")
}

async fn run(state: &AppState, db: Arc<Database>, command: Command) -> Result<()> {
    match command {
        Command::Record {
            path,
            focus_at,
            blur_at,
            name,
        } => cmd_record(db, &path, focus_at, blur_at, name),
        Command::Today { all, json } => cmd_today(state, all, json).await,
        Command::Year { json } => cmd_year(state, json).await,
        Command::Apps => cmd_apps(state).await,
        Command::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(state),
            ConfigAction::Set { field, value } => cmd_config_set(state, &field, &value),
        },
        Command::Menu { id } => cmd_menu(state, &id),
    }
}

fn cmd_record(
    db: Arc<Database>,
    path: &str,
    focus_at: i64,
    blur_at: i64,
    name: Option<String>,
) -> Result<()> {
    if blur_at < focus_at {
        anyhow::bail!("blur_at ({}) is before focus_at ({})", blur_at, focus_at);
    }

    let name = name.unwrap_or_else(|| {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    });

    let backend = LocalBackend::new(db);
    let id = backend
        .register_app(path, &name, None)
        .context("failed to register app")?;
    let interval = FocusInterval::new(id, focus_at, blur_at)
        .context("invalid focus interval")?;
    backend
        .record(&interval)
        .context("failed to record focus interval")?;

    println!(
        "Recorded {} for {} (app {})",
        format_or_zero(interval.duration_millis()),
        name,
        id
    );
    Ok(())
}

async fn cmd_today(state: &AppState, all: bool, json: bool) -> Result<()> {
    let aggregator = state.aggregator();
    let rows = if all {
        aggregator.aggregate_today().await
    } else {
        aggregator.aggregate_today_filtered().await
    }
    .context("failed to aggregate today's usage")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No usage recorded today.");
        return Ok(());
    }

    let total: i64 = rows.iter().map(|r| r.duration_millis).sum();
    println!("Today: {}", format_or_zero(total));
    println!();
    for row in &rows {
        let marker = if row.app.exist { "" } else { "  (uninstalled)" };
        println!(
            "  {:<32} {:>14}{}",
            row.app.display_name(),
            format_or_zero(row.duration_millis),
            marker
        );
    }
    Ok(())
}

async fn cmd_year(state: &AppState, json: bool) -> Result<()> {
    let days = state
        .aggregator()
        .aggregate_year_by_day()
        .await
        .context("failed to aggregate this year's usage")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
        return Ok(());
    }

    if days.is_empty() {
        println!("No usage recorded this year.");
        return Ok(());
    }

    let config = state.config().config();
    let clock = SystemClock;
    let now = clock.now();
    let year_start = time::start_of_year(&clock, &now);

    let total: i64 = days.values().sum();
    println!(
        "This year: {} over {} days",
        format_or_zero(total),
        days.len()
    );
    println!();
    for (day, millis) in &days {
        let date = year_start + Duration::days(day - 1);
        println!(
            "  day {:>3}  {}  weekday {}  {:>14}",
            day,
            format_with_pattern(&date, &config.date_format),
            state.aggregator().weekday_offset(&date) + 1,
            format_or_zero(*millis)
        );
    }
    Ok(())
}

async fn cmd_apps(state: &AppState) -> Result<()> {
    let details = state
        .aggregator()
        .app_details()
        .await
        .context("failed to list apps")?;

    let mut apps: Vec<_> = details.into_values().collect();
    apps.sort_by_key(|app| app.id);

    if apps.is_empty() {
        println!("No apps recorded yet.");
        return Ok(());
    }

    for app in &apps {
        let marker = if app.exist { "" } else { "  (uninstalled)" };
        println!(
            "{:>5}  {:<32} {}{}",
            app.id,
            app.display_name(),
            app.path,
            marker
        );
    }
    Ok(())
}

fn cmd_config_show(state: &AppState) -> Result<()> {
    let store = state.config();
    let out = serde_json::json!({
        "config": store.config(),
        "derived": store.derived(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_config_set(state: &AppState, field: &str, value: &str) -> Result<()> {
    let update = ConfigUpdate::parse(field, value).context("invalid setting")?;
    if state.config().set(update) {
        println!("Updated {}", field);
    } else {
        println!("{} unchanged", field);
    }
    Ok(())
}

fn cmd_menu(state: &AppState, id: &str) -> Result<()> {
    let command: MenuCommand = id.parse().context("invalid menu item")?;
    if state.config().apply_menu(command) {
        println!("Applied {}", command);
    } else {
        println!("{} already active", command);
    }
    Ok(())
}

/// Durations under a second print as `0s` instead of nothing.
fn format_or_zero(millis: i64) -> String {
    let formatted = format_duration(millis);
    if formatted.is_empty() {
        "0s".to_string()
    } else {
        formatted
    }
}
