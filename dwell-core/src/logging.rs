//! Logging setup
//!
//! Events go to a daily-rolling file under the XDG state directory
//! (`~/.local/state/dwell/dwell.log`). Front ends can also echo them to
//! stderr.
//!
//! The filter comes from `DWELL_LOG`, then `RUST_LOG`, then the configured
//! level. The configured level applies to the dwell crates only; everything
//! else stays at `warn`.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "dwell.log";
const ENV_VAR: &str = "DWELL_LOG";

/// Install the global subscriber.
///
/// Keep the returned guard alive for as long as events should reach the
/// file; dropping it flushes what is buffered.
pub fn init(config: &LoggingConfig, echo_stderr: bool) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log file: {}", e)))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stderr_layer = echo_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter(&config.level))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::debug!(log_dir = %log_dir.display(), level = %config.level, "Logging initialized");

    Ok(LoggingGuard { _guard: guard })
}

/// Test subscriber writing through the test harness.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// `warn` globally, `level` for the dwell crates.
fn default_directives(level: &str) -> String {
    format!("warn,dwell={level},dwell_core={level}")
}

/// Flushes buffered log lines when dropped.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}
