//! Tracing subscriber setup.
//!
//! Two profiles, picked from `RINGRULE_ENV`:
//! - `production`: JSON lines to a daily rolling file plus compact stdout
//!   for the service manager.
//! - anything else: pretty stdout with span open/close events.
//!
//! `RUST_LOG` takes precedence over `RINGRULE_LOG_LEVEL` (default `info`).

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LEVEL: &str = "info";
const LOG_FILE_PREFIX: &str = "ringrule.log";

// Dropping a guard stops its writer thread.
static GUARDS: OnceLock<(WorkerGuard, WorkerGuard)> = OnceLock::new();

/// Which subscriber stack to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogProfile {
    /// Pretty, colored stdout.
    Development,
    /// JSON file output plus plain stdout.
    Production,
}

impl LogProfile {
    /// Reads `RINGRULE_ENV`; only `production` selects the production profile.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_name(std::env::var("RINGRULE_ENV").ok().as_deref())
    }

    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some(name) if name.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }
}

/// Install the global subscriber for `profile`.
///
/// # Errors
///
/// Fails on an unparsable filter directive, or in production when the log
/// directory cannot be created.
pub fn init(profile: LogProfile) -> anyhow::Result<()> {
    let filter = build_filter()?;
    match profile {
        LogProfile::Production => install_production(filter, log_directory()),
        LogProfile::Development => {
            install_development(filter);
            Ok(())
        }
    }
}

fn build_filter() -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = std::env::var("RINGRULE_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LEVEL.to_string());
    Ok(EnvFilter::try_new(level)?)
}

fn install_production(filter: EnvFilter, dir: PathBuf) -> anyhow::Result<()> {
    std::fs::create_dir_all(&dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE_PREFIX);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_current_span(true)
        .with_file(true)
        .with_line_number(true);

    // journald adds its own timestamps and does not render ANSI
    let plain_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .without_time()
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .init();

    let _ = GUARDS.set((file_guard, stdout_guard));
    tracing::debug!(dir = %dir.display(), "File logging enabled");
    Ok(())
}

fn install_development(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
        )
        .init();
}

/// `RINGRULE_LOG_DIR`, else `/var/log/ringrule` on Linux, else the
/// per-user data directory.
fn log_directory() -> PathBuf {
    if let Ok(dir) = std::env::var("RINGRULE_LOG_DIR") {
        return PathBuf::from(dir);
    }
    if cfg!(target_os = "linux") {
        return PathBuf::from("/var/log/ringrule");
    }
    directories::ProjectDirs::from("", "", "ringrule")
        .map_or_else(|| PathBuf::from("logs"), |dirs| dirs.data_dir().join("logs"))
}
