//! Logging initialization using the `tracing` ecosystem.
//!
//! The adapter logs three classes of events with distinct severities:
//! informational (clean disconnects, lifecycle transitions), diagnostic
//! (skipped ticks), and error (connectivity failures, dropped payloads).
//! Console output is always on; a daily-rotating file layer is added when a
//! log directory is configured.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber. Call once at program start.
///
/// `log_level` is the default filter when the `RUST_LOG` env var is unset.
/// `log_dir`, when present, enables a daily-rotating file layer with
/// `file_prefix` as the log file name prefix.
pub fn init_logging(log_level: &str, log_dir: Option<&str>, file_prefix: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let file_layer = log_dir.map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, file_prefix);
        fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(file_layer)
        .init();
}
