use crate::constants::{CLI_WAL_AUTOCHECKPOINT, DAEMON_WAL_AUTOCHECKPOINT, SQLITE_BUSY_TIMEOUT_MS};
use crate::{ReaperError, ReaperResult};
use rusqlite::Connection;

/// Which process opens the connection; selects checkpoint pragmas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Daemon, // wal_autocheckpoint = 1000
    Cli,    // wal_autocheckpoint = 0
}

/// Open a SQLite connection with the pragmas for `role`.
pub fn open_connection(path: &std::path::Path, role: ConnectionRole) -> ReaperResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)
        .map_err(|e| ReaperError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    tracing::debug!(path = %path.display(), role = ?role, "Database connection opened");

    configure_common(&conn)?;

    let autocheckpoint = match role {
        ConnectionRole::Daemon => DAEMON_WAL_AUTOCHECKPOINT,
        ConnectionRole::Cli => CLI_WAL_AUTOCHECKPOINT,
    };
    conn.execute_batch(&format!("PRAGMA wal_autocheckpoint = {};", autocheckpoint))
        .map_err(|e| ReaperError::Storage(format!("Failed to configure checkpoint pragma: {}", e)))?;

    Ok(conn)
}

/// Pragmas shared by every connection:
/// - journal_mode = WAL (daemon and CLI write the same files)
/// - busy_timeout = SQLITE_BUSY_TIMEOUT_MS
/// - synchronous = NORMAL
/// - foreign_keys = ON
fn configure_common(conn: &Connection) -> ReaperResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = {};
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
        SQLITE_BUSY_TIMEOUT_MS,
    ))
    .map_err(|e| ReaperError::Storage(format!("Failed to configure pragmas: {}", e)))?;
    Ok(())
}
