//! Shared test utilities -- in-memory collaborators, builders, time helpers.
//!
//! Available only under `#[cfg(test)]`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::guild::{GuildId, ThreadId, ThreadState, UserId};
use crate::platform::{ArchiveOutcome, Platform};
use crate::storage::config_store::ConfigStore;
use crate::storage::kv::KvStore;
use crate::{ReaperError, ReaperResult};

// ============================================================================
// MemoryKvStore
// ============================================================================

#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryKvStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> ReaperResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> ReaperResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ReaperError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only store",
            )));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> ReaperResult<Vec<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }
}

pub fn memory_config_store() -> Arc<ConfigStore> {
    Arc::new(ConfigStore::new(Arc::new(MemoryKvStore::default())))
}

// ============================================================================
// MemoryPlatform
// ============================================================================

#[derive(Default)]
struct PlatformState {
    threads: BTreeMap<ThreadId, ThreadState>,
    last_message: HashMap<ThreadId, DateTime<Utc>>,
    admins: HashSet<(GuildId, UserId)>,
    reasons: HashMap<ThreadId, String>,
    fail_fetch: HashSet<ThreadId>,
    fail_list: HashSet<GuildId>,
    fail_archive: HashSet<ThreadId>,
    stale_listing: HashSet<ThreadId>,
    extra_guilds: Vec<GuildId>,
}

/// Scriptable platform with per-thread failure injection.
#[derive(Default)]
pub struct MemoryPlatform {
    state: Mutex<PlatformState>,
    archive_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl MemoryPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_thread(&self, state: ThreadState, last_message: Option<DateTime<Utc>>) {
        let mut s = self.state.lock().unwrap();
        if let Some(at) = last_message {
            s.last_message.insert(state.id, at);
        }
        s.threads.insert(state.id, state);
    }

    /// A guild with no threads still shows up in `list_guilds`.
    pub fn add_empty_guild(&self, guild_id: GuildId) {
        self.state.lock().unwrap().extra_guilds.push(guild_id);
    }

    pub fn set_last_message(&self, thread_id: ThreadId, at: Option<DateTime<Utc>>) {
        let mut s = self.state.lock().unwrap();
        match at {
            Some(at) => s.last_message.insert(thread_id, at),
            None => s.last_message.remove(&thread_id),
        };
    }

    pub fn grant_admin(&self, guild_id: GuildId, user_id: UserId) {
        self.state.lock().unwrap().admins.insert((guild_id, user_id));
    }

    pub fn fail_fetch(&self, thread_id: ThreadId) {
        self.state.lock().unwrap().fail_fetch.insert(thread_id);
    }

    pub fn fail_list(&self, guild_id: GuildId) {
        self.state.lock().unwrap().fail_list.insert(guild_id);
    }

    pub fn fail_archive(&self, thread_id: ThreadId) {
        self.state.lock().unwrap().fail_archive.insert(thread_id);
    }

    /// Archive `thread_id` out of band while `list_threads` keeps reporting
    /// it unarchived, as when an event wins the race against a sweep.
    pub fn archive_behind_listing(&self, thread_id: ThreadId) {
        let mut s = self.state.lock().unwrap();
        if let Some(t) = s.threads.get_mut(&thread_id) {
            t.archived = true;
        }
        s.stale_listing.insert(thread_id);
    }

    pub fn is_archived(&self, thread_id: ThreadId) -> bool {
        self.state
            .lock()
            .unwrap()
            .threads
            .get(&thread_id)
            .map(|t| t.archived)
            .unwrap_or(false)
    }

    pub fn reason(&self, thread_id: ThreadId) -> Option<String> {
        self.state.lock().unwrap().reasons.get(&thread_id).cloned()
    }

    pub fn archive_calls(&self) -> usize {
        self.archive_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

impl Platform for MemoryPlatform {
    fn list_guilds(&self) -> ReaperResult<Vec<GuildId>> {
        let s = self.state.lock().unwrap();
        let mut guilds: Vec<GuildId> = s.threads.values().map(|t| t.guild_id).collect();
        guilds.extend(s.extra_guilds.iter().copied());
        guilds.sort();
        guilds.dedup();
        Ok(guilds)
    }

    fn list_threads(&self, guild_id: GuildId) -> ReaperResult<Vec<ThreadState>> {
        let s = self.state.lock().unwrap();
        if s.fail_list.contains(&guild_id) {
            return Err(ReaperError::PlatformFetch(format!("guild {} unavailable", guild_id)));
        }
        Ok(s.threads
            .values()
            .filter(|t| t.guild_id == guild_id)
            .map(|t| {
                let mut t = t.clone();
                if s.stale_listing.contains(&t.id) {
                    t.archived = false;
                }
                t
            })
            .collect())
    }

    fn fetch_thread(&self, thread_id: ThreadId) -> ReaperResult<Option<ThreadState>> {
        Ok(self.state.lock().unwrap().threads.get(&thread_id).cloned())
    }

    fn last_message_at(&self, thread_id: ThreadId) -> ReaperResult<Option<DateTime<Utc>>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let s = self.state.lock().unwrap();
        if s.fail_fetch.contains(&thread_id) {
            return Err(ReaperError::PlatformFetch(format!("history of {} unavailable", thread_id)));
        }
        Ok(s.last_message.get(&thread_id).copied())
    }

    fn archive_thread(&self, thread_id: ThreadId, reason: &str) -> ReaperResult<ArchiveOutcome> {
        self.archive_calls.fetch_add(1, Ordering::SeqCst);
        let mut s = self.state.lock().unwrap();
        if s.fail_archive.contains(&thread_id) {
            return Err(ReaperError::PlatformMutation {
                thread_id,
                reason: "rate limited".to_string(),
            });
        }
        let thread = s.threads.get_mut(&thread_id).ok_or(ReaperError::PlatformMutation {
            thread_id,
            reason: "unknown thread".to_string(),
        })?;
        if thread.archived {
            return Ok(ArchiveOutcome::AlreadyArchived);
        }
        thread.archived = true;
        s.reasons.insert(thread_id, reason.to_string());
        Ok(ArchiveOutcome::Applied)
    }

    fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> ReaperResult<bool> {
        Ok(self.state.lock().unwrap().admins.contains(&(guild_id, user_id)))
    }
}

// ============================================================================
// ThreadBuilder
// ============================================================================

#[derive(Clone)]
pub struct ThreadBuilder {
    state: ThreadState,
}

impl ThreadBuilder {
    pub fn new(id: u64, guild_id: u64) -> Self {
        Self {
            state: ThreadState::new(ThreadId(id), GuildId(guild_id)),
        }
    }

    pub fn archived(mut self) -> Self {
        self.state.archived = true;
        self
    }

    pub fn locked(mut self) -> Self {
        self.state.locked = true;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.state.pinned = true;
        self
    }

    pub fn build(self) -> ThreadState {
        self.state
    }
}

// ============================================================================
// Time helpers
// ============================================================================

pub fn secs_ago(s: i64) -> DateTime<Utc> {
    Utc::now() - Duration::seconds(s)
}

pub fn hours_ago(h: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(h)
}

pub fn days_ago(d: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(d)
}
