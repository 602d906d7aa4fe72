//! Tracing initialization -- daemon and CLI append to the same daemon.log.

use std::sync::Mutex;

use crate::storage::path_utils;

/// Initialize global tracing to `{data_dir}/daemon.log` (append mode).
///
/// Filter comes from `RUST_LOG`, default `info`. Falls back to the null
/// device when the log file cannot be opened. Safe to call more than once:
/// later calls are ignored.
pub fn init_global_tracing() {
    use tracing_subscriber::EnvFilter;

    let log_path = path_utils::log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    // Short appends are atomic on Linux/macOS, so several processes can share the file.
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(f) => f,
        Err(_) => {
            let null = if cfg!(windows) { "NUL" } else { "/dev/null" };
            match std::fs::OpenOptions::new().write(true).open(null) {
                Ok(f) => f,
                Err(_) => return,
            }
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_target(true)
        .with_ansi(false)
        .try_init();
}
