use thiserror::Error;

use crate::guild::{GuildId, ThreadId, UserId};

#[derive(Error, Debug)]
pub enum ReaperError {
    /// Persisting a guild config failed. Surfaced to the command caller.
    #[error("Config write failed for guild {guild_id}: {reason}")]
    ConfigWrite { guild_id: GuildId, reason: String },

    /// Reading from the platform failed. The thread is skipped for this pass.
    #[error("Platform fetch failed: {0}")]
    PlatformFetch(String),

    /// Archiving a thread failed. The archive is considered not applied.
    #[error("Platform mutation failed on thread {thread_id}: {reason}")]
    PlatformMutation { thread_id: ThreadId, reason: String },

    #[error("Permission denied: user {user_id} is not an administrator of guild {guild_id}")]
    PermissionDenied { guild_id: GuildId, user_id: UserId },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Business-logic storage errors (unreadable record, bad layout, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raw database errors from rusqlite
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type ReaperResult<T> = Result<T, ReaperError>;
