//! Tracing initialization for stdout and append-only file logging.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::Result;

/// Initialize tracing with a stdout layer and a non-blocking file layer
/// writing under `log_dir`.
///
/// The returned guard must be kept alive for the duration of the process;
/// dropping it flushes and stops the background log writer.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "merge-sentry.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .init();

    Ok(guard)
}
