//! Chat platform collaborator.
//!
//! Every call may block on I/O. Implementations must be shareable across the
//! scheduler thread, event workers and IPC handlers.

pub mod local;

use chrono::{DateTime, Utc};

use crate::guild::{GuildId, ThreadId, ThreadState, UserId};
use crate::ReaperResult;

/// Result of an archive mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Applied,
    /// The thread was already archived; nothing changed.
    AlreadyArchived,
}

pub trait Platform: Send + Sync {
    /// Every guild the bot is a member of.
    fn list_guilds(&self) -> ReaperResult<Vec<GuildId>>;

    /// Every thread currently known in `guild_id`, archived or not.
    fn list_threads(&self, guild_id: GuildId) -> ReaperResult<Vec<ThreadState>>;

    /// Current state of a single thread, `None` if it no longer exists.
    fn fetch_thread(&self, thread_id: ThreadId) -> ReaperResult<Option<ThreadState>>;

    /// Timestamp of the newest message, fetched from history (limit 1).
    /// `None` when the thread has no messages.
    fn last_message_at(&self, thread_id: ThreadId) -> ReaperResult<Option<DateTime<Utc>>>;

    /// Mark the thread archived, recording `reason` in the audit log.
    fn archive_thread(&self, thread_id: ThreadId, reason: &str) -> ReaperResult<ArchiveOutcome>;

    fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> ReaperResult<bool>;
}
