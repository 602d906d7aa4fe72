//! `notify`: deliver a platform event to the running daemon.

use anyhow::{Context, Result};
use thread_reaper::guild::{GuildId, ThreadId, ThreadState};
use thread_reaper::ipc_client;

pub fn thread_updated(thread: &ThreadState) -> Result<()> {
    ipc_client::thread_updated(thread).context("Failed to deliver thread update")?;
    println!("Queued thread_updated for thread {}", thread.id);
    Ok(())
}

pub fn message_deleted(guild_id: GuildId, thread_id: ThreadId) -> Result<()> {
    ipc_client::message_deleted(guild_id, thread_id).context("Failed to deliver message deletion")?;
    println!("Queued message_deleted for thread {}", thread_id);
    Ok(())
}
