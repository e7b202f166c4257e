//! Tracing configuration for clipcast
//!
//! Structured logging through `tracing`, formatted to stdout and, when
//! asked for, to a log file under the platform data directory.
//!
//! Messages aimed at the operator (admission warnings, "cannot reach the
//! server") are logged under the `clipcast::operator` target and stay visible
//! at the default level.

use std::{fs, io, path::PathBuf, sync::OnceLock};

use anyhow::Context;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, registry};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_NAME: &str = "clipcast.log";

/// Check if running in development environment
fn is_development() -> bool {
    cfg!(debug_assertions)
}

/// Build the default filter directives for tracing
///
/// ## Behavior / 行为
/// - **Development**: debug level for the workspace crates
/// - **Production**: info level, operator messages always on
fn build_filter_directives(is_dev: bool) -> Vec<String> {
    vec![
        if is_dev { "debug" } else { "info" }.to_string(),
        "clipcast::operator=info".to_string(),
        if is_dev {
            "cc_platform=debug"
        } else {
            "cc_platform=info"
        }
        .to_string(),
        if is_dev { "cc_app=debug" } else { "cc_app=info" }.to_string(),
    ]
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` overrides the default directives. With `log_to_file` the same
/// events are also written, without colors, to `clipcast.log`; if the file
/// cannot be opened logging falls back to stdout only.
///
/// ## Errors / 错误
///
/// Returns `Err` if a global subscriber is already registered.
pub fn init_tracing_subscriber(log_to_file: bool) -> anyhow::Result<()> {
    let is_dev = is_development();

    let filter_directives = build_filter_directives(is_dev);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_directives.join(",")));

    let stdout_writer: BoxMakeWriter = BoxMakeWriter::new(io::stdout);
    let file_writer = if log_to_file {
        match build_file_writer() {
            Ok(writer) => Some(writer),
            Err(err) => {
                eprintln!("Failed to initialize file logging, falling back to stdout: {err}");
                None
            }
        }
    } else {
        None
    };

    // "2025-01-15 10:30:45.123 INFO clipcast::operator: message"
    let stdout_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .with_level(true)
        .with_target(true)
        .with_ansi(cfg!(not(test)))
        .with_writer(stdout_writer);

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_timer(fmt::time::ChronoUtc::new(
                "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            ))
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
    });

    let subscriber = registry().with(env_filter).with(stdout_layer);

    if let Some(layer) = file_layer {
        subscriber.with(layer).try_init()?;
    } else {
        subscriber.try_init()?;
    }

    Ok(())
}

fn logs_dir() -> anyhow::Result<PathBuf> {
    dirs::data_local_dir()
        .map(|dir| dir.join(super::config::APP_DIR_NAME).join("logs"))
        .context("no local data directory on this platform")
}

fn build_file_writer() -> anyhow::Result<NonBlocking> {
    let logs_dir = logs_dir()?;
    fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create log directory: {}", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&logs_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    LOG_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Tracing log guard already initialized"))?;

    Ok(non_blocking)
}
