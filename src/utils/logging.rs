use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

pub const TIMING_TARGET: &str = "app.timing";

/// Flush handles for the file writers; drop them only at exit.
pub struct LoggingGuards {
    _writers: Vec<WorkerGuard>,
}

pub(crate) fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Everything except the timing stream; HTTP internals only at WARN.
pub(crate) fn application_targets(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(TIMING_TARGET, LevelFilter::OFF)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN)
}

pub(crate) fn timing_targets() -> Targets {
    Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO)
}

fn daily_writer(
    logs_dir: &Path,
    file_name: &str,
    guards: &mut Vec<WorkerGuard>,
) -> NonBlocking {
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, file_name));
    guards.push(guard);
    writer
}

/// Installs the global subscriber: stderr plus daily `app.log`/`app.jsonl`,
/// and the `app.timing` target routed to `timing.log`/`timing.jsonl` only.
pub fn init_logging(log_level: &str, logs_dir: &Path) -> LoggingGuards {
    if let Err(err) = fs::create_dir_all(logs_dir) {
        eprintln!("Failed to create logs directory {}: {err}", logs_dir.display());
    }

    let mut guards = Vec::with_capacity(4);
    let app_text = daily_writer(logs_dir, "app.log", &mut guards);
    let app_json = daily_writer(logs_dir, "app.jsonl", &mut guards);
    let timing_text = daily_writer(logs_dir, "timing.log", &mut guards);
    let timing_json = daily_writer(logs_dir, "timing.jsonl", &mut guards);

    let application = application_targets(parse_log_level(log_level));
    let timing = timing_targets();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(application.clone()),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(app_text)
                .with_filter(application.clone()),
        )
        .with(
            fmt::layer()
                .json()
                .with_writer(app_json)
                .with_filter(application),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(timing_text)
                .with_filter(timing.clone()),
        )
        .with(fmt::layer().json().with_writer(timing_json).with_filter(timing))
        .init();

    LoggingGuards { _writers: guards }
}
