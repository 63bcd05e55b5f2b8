//! Logging setup: env filter, console output and optional rolling file

use anyhow::{Context, Result};
use pricewatch_core::application::worker::panic_message;
use std::backtrace::Backtrace;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "pricewatch.log";

/// Install the global subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter directives (default: `info`)
/// - `PRICEWATCH_LOG_FORMAT`: `json` for structured output, anything else for pretty
///
/// The returned guard flushes the file writer on drop and must live until exit.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    let log_format =
        std::env::var("PRICEWATCH_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    match log_format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    }
    .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// Route panics through tracing with their location and a backtrace
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let backtrace = Backtrace::force_capture();

        tracing::error!(
            location = %location,
            panic_msg = %panic_message(info.payload()),
            backtrace = %backtrace,
            "Panic"
        );
    }));
}
