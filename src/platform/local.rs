//! SQLite mirror of guild/thread/message state.
//!
//! Stands in for the chat gateway: a feeder process (or the `mirror` CLI)
//! writes guilds, threads and messages, and the daemon reads them through
//! the [`Platform`] trait.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ArchiveOutcome, Platform};
use crate::guild::{GuildId, MessageId, ThreadId, ThreadState, UserId};
use crate::storage::database::{open_connection, ConnectionRole};
use crate::storage::migrations;
use crate::{time_utils, ReaperError, ReaperResult};

pub struct LocalPlatform {
    conn: Mutex<Connection>,
}

fn thread_from_row(row: &Row) -> rusqlite::Result<ThreadState> {
    Ok(ThreadState {
        id: ThreadId::from_sql(row.get("id")?),
        guild_id: GuildId::from_sql(row.get("guild_id")?),
        archived: row.get::<_, i32>("archived")? != 0,
        locked: row.get::<_, i32>("locked")? != 0,
        pinned: row.get::<_, i32>("pinned")? != 0,
    })
}

fn fetch_err(e: impl std::fmt::Display) -> ReaperError {
    ReaperError::PlatformFetch(e.to_string())
}

impl LocalPlatform {
    pub fn open(path: &Path, role: ConnectionRole) -> ReaperResult<Self> {
        let conn = open_connection(path, role)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> ReaperResult<Self> {
        migrations::migrate_platform_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> ReaperResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReaperError::Storage(format!("Platform DB lock poisoned: {}", e)))
    }

    // ── Mirror writes ──

    pub fn upsert_guild(&self, guild_id: GuildId, name: &str) -> ReaperResult<()> {
        self.conn()?.execute(
            "INSERT INTO guilds (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![guild_id.as_sql(), name],
        )?;
        Ok(())
    }

    pub fn grant_admin(&self, guild_id: GuildId, user_id: UserId) -> ReaperResult<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO administrators (guild_id, user_id) VALUES (?1, ?2)",
            params![guild_id.as_sql(), user_id.as_sql()],
        )?;
        Ok(())
    }

    pub fn upsert_thread(&self, state: &ThreadState, name: &str) -> ReaperResult<()> {
        self.conn()?.execute(
            "INSERT INTO threads (id, guild_id, name, archived, locked, pinned)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                guild_id = excluded.guild_id, name = excluded.name,
                archived = excluded.archived, locked = excluded.locked, pinned = excluded.pinned",
            params![
                state.id.as_sql(),
                state.guild_id.as_sql(),
                name,
                state.archived as i32,
                state.locked as i32,
                state.pinned as i32,
            ],
        )?;
        Ok(())
    }

    /// Change any subset of a thread's flags. Returns the new state, `None` if unknown.
    pub fn set_thread_flags(
        &self,
        thread_id: ThreadId,
        archived: Option<bool>,
        locked: Option<bool>,
        pinned: Option<bool>,
    ) -> ReaperResult<Option<ThreadState>> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE threads SET
                archived = COALESCE(?2, archived),
                locked = COALESCE(?3, locked),
                pinned = COALESCE(?4, pinned),
                archive_reason = CASE WHEN ?2 = 0 THEN NULL ELSE archive_reason END,
                archived_at = CASE WHEN ?2 = 0 THEN NULL ELSE archived_at END
             WHERE id = ?1",
            params![
                thread_id.as_sql(),
                archived.map(|b| b as i32),
                locked.map(|b| b as i32),
                pinned.map(|b| b as i32),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let state = conn
            .query_row(
                "SELECT id, guild_id, archived, locked, pinned FROM threads WHERE id = ?1",
                params![thread_id.as_sql()],
                thread_from_row,
            )
            .optional()?;
        Ok(state)
    }

    pub fn post_message(
        &self,
        thread_id: ThreadId,
        message_id: MessageId,
        author_id: UserId,
        at: DateTime<Utc>,
    ) -> ReaperResult<()> {
        self.conn()?.execute(
            "INSERT INTO messages (id, thread_id, author_id, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
            params![
                message_id.as_sql(),
                thread_id.as_sql(),
                author_id.as_sql(),
                time_utils::to_millis(&at),
            ],
        )?;
        Ok(())
    }

    /// Delete a message. Returns the owning (guild, thread), `None` if unknown.
    pub fn delete_message(&self, message_id: MessageId) -> ReaperResult<Option<(GuildId, ThreadId)>> {
        let conn = self.conn()?;
        let owner = conn
            .query_row(
                "SELECT t.guild_id, t.id FROM messages m JOIN threads t ON t.id = m.thread_id
                 WHERE m.id = ?1",
                params![message_id.as_sql()],
                |r| Ok((GuildId::from_sql(r.get(0)?), ThreadId::from_sql(r.get(1)?))),
            )
            .optional()?;
        if owner.is_some() {
            conn.execute("DELETE FROM messages WHERE id = ?1", params![message_id.as_sql()])?;
        }
        Ok(owner)
    }

    /// Audit reason recorded by the last archive mutation.
    pub fn archive_reason(&self, thread_id: ThreadId) -> ReaperResult<Option<String>> {
        let reason = self
            .conn()?
            .query_row(
                "SELECT archive_reason FROM threads WHERE id = ?1",
                params![thread_id.as_sql()],
                |r| r.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(reason.flatten())
    }
}

impl Platform for LocalPlatform {
    fn list_guilds(&self) -> ReaperResult<Vec<GuildId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM guilds ORDER BY id").map_err(fetch_err)?;
        let ids = stmt
            .query_map([], |r| r.get::<_, i64>(0).map(GuildId::from_sql))
            .map_err(fetch_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(fetch_err)?;
        Ok(ids)
    }

    fn list_threads(&self, guild_id: GuildId) -> ReaperResult<Vec<ThreadState>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, guild_id, archived, locked, pinned FROM threads
                 WHERE guild_id = ?1 ORDER BY id",
            )
            .map_err(fetch_err)?;
        let threads = stmt
            .query_map(params![guild_id.as_sql()], thread_from_row)
            .map_err(fetch_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(fetch_err)?;
        Ok(threads)
    }

    fn fetch_thread(&self, thread_id: ThreadId) -> ReaperResult<Option<ThreadState>> {
        self.conn()?
            .query_row(
                "SELECT id, guild_id, archived, locked, pinned FROM threads WHERE id = ?1",
                params![thread_id.as_sql()],
                thread_from_row,
            )
            .optional()
            .map_err(fetch_err)
    }

    fn last_message_at(&self, thread_id: ThreadId) -> ReaperResult<Option<DateTime<Utc>>> {
        let ms = self
            .conn()?
            .query_row(
                "SELECT created_at_ms FROM messages WHERE thread_id = ?1
                 ORDER BY created_at_ms DESC LIMIT 1",
                params![thread_id.as_sql()],
                |r| r.get::<_, i64>(0),
            )
            .optional()
            .map_err(fetch_err)?;
        // An unrepresentable timestamp counts as missing history.
        Ok(ms.and_then(time_utils::from_millis))
    }

    fn archive_thread(&self, thread_id: ThreadId, reason: &str) -> ReaperResult<ArchiveOutcome> {
        let mutation_err = |e: rusqlite::Error| ReaperError::PlatformMutation {
            thread_id,
            reason: e.to_string(),
        };
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE threads SET archived = 1, archive_reason = ?2, archived_at = ?3
                 WHERE id = ?1 AND archived = 0",
                params![thread_id.as_sql(), reason, time_utils::to_sqlite(&time_utils::now())],
            )
            .map_err(mutation_err)?;
        if changed > 0 {
            return Ok(ArchiveOutcome::Applied);
        }

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM threads WHERE id = ?1",
                params![thread_id.as_sql()],
                |r| r.get(0),
            )
            .map_err(mutation_err)?;
        if exists {
            Ok(ArchiveOutcome::AlreadyArchived)
        } else {
            Err(ReaperError::PlatformMutation {
                thread_id,
                reason: "unknown thread".to_string(),
            })
        }
    }

    fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> ReaperResult<bool> {
        self.conn()?
            .query_row(
                "SELECT COUNT(*) > 0 FROM administrators WHERE guild_id = ?1 AND user_id = ?2",
                params![guild_id.as_sql(), user_id.as_sql()],
                |r| r.get(0),
            )
            .map_err(fetch_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn mirror() -> LocalPlatform {
        let p = LocalPlatform::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        p.upsert_guild(GuildId(1), "guild").unwrap();
        p
    }

    #[test]
    fn test_list_guilds_and_threads() {
        let p = mirror();
        p.upsert_guild(GuildId(2), "other").unwrap();
        p.upsert_thread(&ThreadState::new(ThreadId(10), GuildId(1)), "a").unwrap();
        p.upsert_thread(&ThreadState::new(ThreadId(11), GuildId(2)), "b").unwrap();

        assert_eq!(p.list_guilds().unwrap(), vec![GuildId(1), GuildId(2)]);
        let threads = p.list_threads(GuildId(1)).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].id, ThreadId(10));
    }

    #[test]
    fn test_last_message_is_newest_by_time_not_id() {
        let p = mirror();
        p.upsert_thread(&ThreadState::new(ThreadId(10), GuildId(1)), "a").unwrap();
        assert_eq!(p.last_message_at(ThreadId(10)).unwrap(), None);

        let newest = hours_ago(1);
        p.post_message(ThreadId(10), MessageId(2), UserId(5), newest).unwrap();
        p.post_message(ThreadId(10), MessageId(3), UserId(5), hours_ago(30)).unwrap();

        let got = p.last_message_at(ThreadId(10)).unwrap().unwrap();
        assert_eq!(got.timestamp_millis(), newest.timestamp_millis());
    }

    #[test]
    fn test_delete_message_reports_owner() {
        let p = mirror();
        p.upsert_thread(&ThreadState::new(ThreadId(10), GuildId(1)), "a").unwrap();
        p.post_message(ThreadId(10), MessageId(2), UserId(5), hours_ago(1)).unwrap();

        assert_eq!(p.delete_message(MessageId(2)).unwrap(), Some((GuildId(1), ThreadId(10))));
        assert_eq!(p.delete_message(MessageId(2)).unwrap(), None);
        assert_eq!(p.last_message_at(ThreadId(10)).unwrap(), None);
    }

    #[test]
    fn test_archive_is_idempotent_and_records_reason() {
        let p = mirror();
        p.upsert_thread(&ThreadState::new(ThreadId(10), GuildId(1)), "a").unwrap();

        assert_eq!(p.archive_thread(ThreadId(10), "idle").unwrap(), ArchiveOutcome::Applied);
        assert_eq!(
            p.archive_thread(ThreadId(10), "idle").unwrap(),
            ArchiveOutcome::AlreadyArchived
        );
        assert!(p.fetch_thread(ThreadId(10)).unwrap().unwrap().archived);
        assert_eq!(p.archive_reason(ThreadId(10)).unwrap().as_deref(), Some("idle"));
    }

    #[test]
    fn test_archive_unknown_thread_is_mutation_error() {
        let p = mirror();
        let err = p.archive_thread(ThreadId(99), "idle").unwrap_err();
        assert!(matches!(err, ReaperError::PlatformMutation { thread_id: ThreadId(99), .. }));
    }

    #[test]
    fn test_set_flags_partial_and_unarchive_clears_reason() {
        let p = mirror();
        p.upsert_thread(&ThreadState::new(ThreadId(10), GuildId(1)), "a").unwrap();
        p.archive_thread(ThreadId(10), "idle").unwrap();

        let state = p.set_thread_flags(ThreadId(10), None, None, Some(true)).unwrap().unwrap();
        assert!(state.archived && state.pinned && !state.locked);

        let state = p.set_thread_flags(ThreadId(10), Some(false), None, None).unwrap().unwrap();
        assert!(!state.archived && state.pinned);
        assert_eq!(p.archive_reason(ThreadId(10)).unwrap(), None);

        assert!(p.set_thread_flags(ThreadId(404), Some(true), None, None).unwrap().is_none());
    }

    #[test]
    fn test_administrators() {
        let p = mirror();
        p.grant_admin(GuildId(1), UserId(7)).unwrap();
        assert!(p.is_administrator(GuildId(1), UserId(7)).unwrap());
        assert!(!p.is_administrator(GuildId(1), UserId(8)).unwrap());
    }
}
