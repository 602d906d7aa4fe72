//! `mirror`: seed and mutate the local platform mirror.
//!
//! Thread flag changes and message deletions are forwarded to a running
//! daemon as platform events, the way the gateway would deliver them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use thread_reaper::config::DaemonConfig;
use thread_reaper::guild::{GuildId, MessageId, ThreadId, ThreadState, UserId};
use thread_reaper::ipc_client;

use super::{daemon, open_mirror};

pub fn guild(guild_id: GuildId, name: &str) -> Result<()> {
    let platform = open_mirror(&DaemonConfig::load())?;
    platform.upsert_guild(guild_id, name)?;
    println!("Guild {} ({}) mirrored", guild_id, name);
    Ok(())
}

pub fn admin(guild_id: GuildId, user_id: UserId) -> Result<()> {
    let platform = open_mirror(&DaemonConfig::load())?;
    platform
        .grant_admin(guild_id, user_id)
        .with_context(|| format!("Failed to grant admin; is guild {} mirrored?", guild_id))?;
    println!("User {} is now an administrator of guild {}", user_id, guild_id);
    Ok(())
}

/// Create a thread, or update an existing thread's flags.
pub fn thread(
    guild_id: GuildId,
    thread_id: ThreadId,
    name: Option<&str>,
    archived: Option<bool>,
    locked: Option<bool>,
    pinned: Option<bool>,
) -> Result<()> {
    let platform = open_mirror(&DaemonConfig::load())?;

    let state = match platform.set_thread_flags(thread_id, archived, locked, pinned)? {
        Some(state) => state,
        None => {
            let state = ThreadState {
                archived: archived.unwrap_or(false),
                locked: locked.unwrap_or(false),
                pinned: pinned.unwrap_or(false),
                ..ThreadState::new(thread_id, guild_id)
            };
            platform
                .upsert_thread(&state, name.unwrap_or(""))
                .with_context(|| format!("Failed to create thread; is guild {} mirrored?", guild_id))?;
            state
        }
    };

    println!(
        "Thread {} in guild {}: archived={} locked={} pinned={}",
        state.id, state.guild_id, state.archived, state.locked, state.pinned
    );
    forward(|| ipc_client::thread_updated(&state));
    Ok(())
}

pub fn post(
    thread_id: ThreadId,
    message_id: MessageId,
    author_id: UserId,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    let platform = open_mirror(&DaemonConfig::load())?;
    let at = at.unwrap_or_else(thread_reaper::time_utils::now);
    platform
        .post_message(thread_id, message_id, author_id, at)
        .with_context(|| format!("Failed to post; is thread {} mirrored?", thread_id))?;
    println!("Message {} posted in thread {} at {}", message_id, thread_id, at.to_rfc3339());
    Ok(())
}

pub fn delete(message_id: MessageId) -> Result<()> {
    let platform = open_mirror(&DaemonConfig::load())?;
    match platform.delete_message(message_id)? {
        Some((guild_id, thread_id)) => {
            println!("Message {} deleted from thread {}", message_id, thread_id);
            forward(|| ipc_client::message_deleted(guild_id, thread_id));
        }
        None => println!("Message {} not found", message_id),
    }
    Ok(())
}

/// Send an event to the daemon if one is running; the next sweep covers it otherwise.
fn forward<F>(send: F)
where
    F: FnOnce() -> thread_reaper::ReaperResult<serde_json::Value>,
{
    if !daemon::is_running() {
        return;
    }
    match send() {
        Ok(_) => println!("Daemon notified"),
        Err(e) => eprintln!("Warning: daemon not notified: {}", e),
    }
}
