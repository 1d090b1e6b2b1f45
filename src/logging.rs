//! Log routing for the server and the ingest CLI.
//!
//! The server prints compact lines to stdout and appends an uncoloured copy, with targets, to a
//! log file so failed uploads can be traced after the fact. The CLI logs to stderr only because
//! its stdout carries the JSON report.
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "vectory.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the server subscriber: stdout plus the log file when it can be opened.
///
/// `RUST_LOG` overrides the default filter. The file writer's guard lives in a static so buffered
/// lines are flushed for the whole process; a second call keeps the first subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,lopdf=warn"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        let _ = registry.with(file_layer).try_init();
    } else {
        let _ = registry.try_init();
    }
}

/// Configure a stderr-only subscriber for command-line tools whose stdout carries a report.
pub fn init_cli_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

/// Where the server's log copy goes: `VECTORY_LOG_FILE` when set, else `logs/vectory.log`.
fn log_file_path(override_path: Option<String>) -> PathBuf {
    override_path
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_FILE))
}

/// Open the log file for appending behind a non-blocking writer.
///
/// Returns `None` (stdout logging only) when the directory or file cannot be created.
fn configure_file_writer() -> Option<NonBlocking> {
    let path = log_file_path(std::env::var("VECTORY_LOG_FILE").ok());
    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(Err(err)) = dir.map(std::fs::create_dir_all) {
        eprintln!("Failed to create log directory for {}: {err}", path.display());
        return None;
    }

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
