use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use super::paths::AppPaths;

/// Initialize tracing with a file logger writing to a timestamp-named file.
///
/// Logs go to `log_dir` when given, else to the user data directory. The
/// terminal belongs to the front end, so nothing is ever written to stdout.
/// Filtering is configured via the RUST_LOG environment variable.
pub fn init_tracing(log_dir: Option<&Path>) -> io::Result<PathBuf> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => AppPaths::log_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not determine log directory")
        })?,
    };
    std::fs::create_dir_all(&log_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let file_name = format!("{timestamp}.log");
    let file_appender = rolling::never(&log_dir, &file_name);

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::Layer::new()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true),
        )
        .with(EnvFilter::from_default_env());

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    let path = log_dir.join(file_name);
    tracing::debug!(
        target: "switchboard::utils::tracing",
        path = %path.display(),
        "Tracing initialized with file output. Filter configured via RUST_LOG env var."
    );

    Ok(path)
}
