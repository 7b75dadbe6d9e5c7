//! Logging initialization.
//!
//! Console logging with an environment-filter override (`RUST_LOG`), and
//! an optional daily-rotated file variant for the dispatch server. Call
//! exactly one initializer, once, at process start.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

fn timer() -> UtcTime<&'static [time::format_description::FormatItem<'static>]> {
    UtcTime::new(time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
}

/// Console logging to stderr. `default_directive` applies when `RUST_LOG`
/// is unset, e.g. `"info"` or `"geosnap=debug"`.
pub fn init_console(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_timer(timer())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Console plus daily-rotated file logging under `dir`. The returned
/// guard flushes buffered lines; keep it alive for the process lifetime.
pub fn init_with_file(default_directive: &str, dir: &Path, file_prefix: &str) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(dir, file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_timer(timer())
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    guard
}
