use crate::{ReaperError, ReaperResult};
use rusqlite::Connection;

/// Schema version of the platform mirror.
pub const PLATFORM_SCHEMA_VERSION: u32 = 2;
/// Schema version of the guild config database.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// Current schema version (0 if the table is absent).
pub fn get_schema_version(conn: &Connection) -> ReaperResult<u32> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |r| r.get(0),
        )
        .map_err(|e| ReaperError::Storage(e.to_string()))?;

    if !exists {
        return Ok(0);
    }

    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .map_err(|e| ReaperError::Storage(e.to_string()))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: u32) -> ReaperResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        rusqlite::params![version],
    )
    .map_err(|e| ReaperError::Storage(e.to_string()))?;
    Ok(())
}

// ── Platform mirror ──

const PLATFORM_DB_V1: &str = "
CREATE TABLE IF NOT EXISTS guilds (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS threads (
    id INTEGER PRIMARY KEY,
    guild_id INTEGER NOT NULL REFERENCES guilds(id) ON DELETE CASCADE,
    name TEXT NOT NULL DEFAULT '',
    archived INTEGER NOT NULL DEFAULT 0,
    locked INTEGER NOT NULL DEFAULT 0,
    pinned INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_threads_guild ON threads(guild_id);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY,
    thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    author_id INTEGER NOT NULL DEFAULT 0,
    created_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_thread_time ON messages(thread_id, created_at_ms DESC);

CREATE TABLE IF NOT EXISTS administrators (
    guild_id INTEGER NOT NULL REFERENCES guilds(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL,
    PRIMARY KEY (guild_id, user_id)
);
";

pub fn migrate_platform_db(conn: &Connection) -> ReaperResult<()> {
    conn.execute_batch(SCHEMA_VERSION_TABLE)
        .map_err(|e| ReaperError::Storage(format!("schema_version table failed: {}", e)))?;
    let version = get_schema_version(conn)?;

    if version < 1 {
        conn.execute_batch(PLATFORM_DB_V1)
            .map_err(|e| ReaperError::Storage(format!("Platform DB V1 migration failed: {}", e)))?;
        set_schema_version(conn, 1)?;
    }

    // V2: audit trail for archive mutations
    if version < 2 {
        conn.execute_batch(
            "ALTER TABLE threads ADD COLUMN archive_reason TEXT;
             ALTER TABLE threads ADD COLUMN archived_at TEXT;",
        )
        .map_err(|e| ReaperError::Storage(format!("Platform DB V2 migration failed: {}", e)))?;
        set_schema_version(conn, 2)?;
    }

    Ok(())
}

// ── Guild config store ──

const CONFIG_DB_V1: &str = "
CREATE TABLE IF NOT EXISTS guild_configs (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

pub fn migrate_config_db(conn: &Connection) -> ReaperResult<()> {
    conn.execute_batch(SCHEMA_VERSION_TABLE)
        .map_err(|e| ReaperError::Storage(format!("schema_version table failed: {}", e)))?;
    let version = get_schema_version(conn)?;

    if version < 1 {
        conn.execute_batch(CONFIG_DB_V1)
            .map_err(|e| ReaperError::Storage(format!("Config DB V1 migration failed: {}", e)))?;
        set_schema_version(conn, 1)?;
    }

    Ok(())
}
