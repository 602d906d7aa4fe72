//! Single-thread pipeline shared by the sweep and the event path:
//! fresh snapshot → evaluate → archive.

use std::sync::Arc;

use crate::config::GuildConfig;
use crate::guild::{GuildId, ThreadId, ThreadSnapshot, ThreadState};
use crate::moderation::archiver::Archiver;
use crate::moderation::evaluator::{self, Decision, SkipCause};
use crate::platform::{ArchiveOutcome, Platform};
use crate::storage::config_store::ConfigStore;
use crate::{time_utils, ReaperResult};

/// Result of reconciling one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub decision: Decision,
    /// `None` unless the decision was to archive.
    pub outcome: Option<ArchiveOutcome>,
}

impl Reconciled {
    /// True only when this call changed the thread's state.
    pub fn archived(&self) -> bool {
        self.outcome == Some(ArchiveOutcome::Applied)
    }
}

pub struct ThreadReaper {
    platform: Arc<dyn Platform>,
    configs: Arc<ConfigStore>,
    archiver: Archiver,
}

impl ThreadReaper {
    pub fn new(platform: Arc<dyn Platform>, configs: Arc<ConfigStore>) -> Self {
        let archiver = Archiver::new(platform.clone());
        Self {
            platform,
            configs,
            archiver,
        }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn configs(&self) -> &Arc<ConfigStore> {
        &self.configs
    }

    /// Decide for `state` without mutating anything.
    ///
    /// Guilds without a stored config are evaluated against the default,
    /// which is not persisted.
    pub fn inspect(&self, state: &ThreadState) -> ReaperResult<(Decision, ThreadSnapshot)> {
        self.assess(state, |guild_id| self.configs.peek(guild_id))
    }

    /// Exempt threads short-circuit before any config or history fetch.
    fn assess<F>(&self, state: &ThreadState, load_config: F) -> ReaperResult<(Decision, ThreadSnapshot)>
    where
        F: FnOnce(GuildId) -> ReaperResult<GuildConfig>,
    {
        if let Some(exemption) = state.exemption() {
            let snapshot = ThreadSnapshot::capture(state.clone(), None);
            return Ok((Decision::Skip(SkipCause::Exempt(exemption)), snapshot));
        }

        let config = load_config(state.guild_id)?;
        let last_activity = self.platform.last_message_at(state.id)?;
        let snapshot = ThreadSnapshot::capture(state.clone(), last_activity);
        let now = time_utils::now();
        let decision = evaluator::evaluate(&snapshot, &config, now);

        tracing::debug!(
            thread_id = %state.id,
            guild = %state.guild_id,
            last_activity = ?last_activity,
            inactive_time = config.inactive_time,
            decision = %decision,
            "Thread evaluated"
        );
        Ok((decision, snapshot))
    }

    /// Evaluate `state` and archive it if inactive.
    pub fn reconcile(&self, state: &ThreadState) -> ReaperResult<Reconciled> {
        let (decision, _) = self.assess(state, |guild_id| self.configs.get(guild_id))?;
        let outcome = if decision.is_archive() {
            Some(self.archiver.archive(state.id)?)
        } else {
            None
        };
        Ok(Reconciled { decision, outcome })
    }

    /// Re-read the thread from the platform, then reconcile.
    /// `Ok(None)` when the thread no longer exists.
    pub fn reconcile_by_id(&self, thread_id: ThreadId) -> ReaperResult<Option<Reconciled>> {
        match self.platform.fetch_thread(thread_id)? {
            Some(state) => self.reconcile(&state).map(Some),
            None => {
                tracing::debug!(thread_id = %thread_id, "Thread vanished before reconciliation");
                Ok(None)
            }
        }
    }
}
