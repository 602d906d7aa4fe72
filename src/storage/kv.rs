//! Key-value persistence for guild configs.
//!
//! The config store only needs `key -> serialized text`; two backends are
//! provided: a directory of JSON files and a SQLite table.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::storage::database::{open_connection, ConnectionRole};
use crate::storage::migrations;
use crate::{time_utils, ReaperError, ReaperResult};

pub trait KvStore: Send + Sync {
    /// `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> ReaperResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> ReaperResult<()>;
    fn keys(&self) -> ReaperResult<Vec<String>>;
}

fn validate_key(key: &str) -> ReaperResult<()> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ReaperError::InvalidInput(format!("Invalid store key: {:?}", key)));
    }
    Ok(())
}

// ============================================================================
// JsonFileStore
// ============================================================================

const FILE_SUFFIX: &str = "_config.json";

/// One `{key}_config.json` file per key inside `dir`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", key, FILE_SUFFIX))
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> ReaperResult<Option<String>> {
        validate_key(key)?;
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> ReaperResult<()> {
        validate_key(key)?;
        std::fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a reader never sees a half-written file.
        let final_path = self.path_for(key);
        let tmp_path = self.dir.join(format!(".{}{}.tmp", key, FILE_SUFFIX));
        std::fs::write(&tmp_path, value)?;
        std::fs::rename(&tmp_path, &final_path)?;
        tracing::debug!(path = %final_path.display(), "Config file written");
        Ok(())
    }

    fn keys(&self) -> ReaperResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    return None;
                }
                name.strip_suffix(FILE_SUFFIX).map(str::to_string)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

// ============================================================================
// SqliteKvStore
// ============================================================================

/// `guild_configs(key, value, updated_at)` table.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    pub fn open(path: &Path) -> ReaperResult<Self> {
        let conn = open_connection(path, ConnectionRole::Daemon)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> ReaperResult<Self> {
        migrations::migrate_config_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> ReaperResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReaperError::Storage(format!("Config DB lock poisoned: {}", e)))
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> ReaperResult<Option<String>> {
        validate_key(key)?;
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM guild_configs WHERE key = ?1",
                params![key],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> ReaperResult<()> {
        validate_key(key)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO guild_configs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, time_utils::to_sqlite(&time_utils::now())],
        )?;
        Ok(())
    }

    fn keys(&self) -> ReaperResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM guild_configs ORDER BY key")?;
        let keys = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
