use std::{fs, path::PathBuf};

use directories::BaseDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Logs go to a daily file so they never interleave with streamed tokens on
/// stdout. Keep the guard alive until exit or buffered lines are lost.
pub fn init() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "olama.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn log_dir() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    let dir = base.data_dir().join("olama").join("logs");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
