//! Administrator commands: trigger a sweep, view or set the guild threshold.
//!
//! Both commands check administrator permission before touching any state.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::Serialize;

use crate::config::GuildConfig;
use crate::guild::{GuildId, UserId};
use crate::moderation::scheduler::{SweepOutcome, SweepScheduler};
use crate::platform::Platform;
use crate::storage::config_store::ConfigStore;
use crate::{ReaperError, ReaperResult};

/// Reply to a `configure` call: the resulting config and whether it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigReply {
    pub guild_id: GuildId,
    pub config: GuildConfig,
    pub updated: bool,
}

impl ConfigReply {
    pub fn render(&self) -> String {
        render_config_reply(self.guild_id, &self.config)
    }
}

fn render_config_reply(guild_id: GuildId, config: &GuildConfig) -> String {
    format!(
        "Configuration for guild {}:\n  inactive_time = {}s ({})",
        guild_id,
        config.inactive_time,
        humanize_secs(config.inactive_time)
    )
}

fn humanize_secs(secs: u64) -> String {
    match secs {
        s if s >= 86_400 && s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s >= 3_600 && s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s >= 60 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

pub struct CommandHandler {
    platform: Arc<dyn Platform>,
    configs: Arc<ConfigStore>,
    scheduler: Arc<SweepScheduler>,
}

impl CommandHandler {
    pub fn new(platform: Arc<dyn Platform>, configs: Arc<ConfigStore>, scheduler: Arc<SweepScheduler>) -> Self {
        Self {
            platform,
            configs,
            scheduler,
        }
    }

    fn require_admin(&self, guild_id: GuildId, actor: UserId) -> ReaperResult<()> {
        if self.platform.is_administrator(guild_id, actor)? {
            Ok(())
        } else {
            tracing::warn!(guild = %guild_id, actor = %actor, "Command refused, actor is not an administrator");
            Err(ReaperError::PermissionDenied {
                guild_id,
                user_id: actor,
            })
        }
    }

    /// Run a full sweep on behalf of a guild administrator.
    ///
    /// The sweep stops between guilds once `running` goes false.
    pub fn sweep_now(&self, guild_id: GuildId, actor: UserId, running: &AtomicBool) -> ReaperResult<SweepOutcome> {
        self.require_admin(guild_id, actor)?;
        tracing::info!(guild = %guild_id, actor = %actor, "Manual sweep requested");
        Ok(self.scheduler.sweep_until(running))
    }

    /// View (`None`) or set the guild's inactivity threshold.
    pub fn configure(
        &self,
        guild_id: GuildId,
        actor: UserId,
        inactive_time: Option<u64>,
    ) -> ReaperResult<ConfigReply> {
        self.require_admin(guild_id, actor)?;

        match inactive_time {
            None => Ok(ConfigReply {
                guild_id,
                config: self.configs.get(guild_id)?,
                updated: false,
            }),
            Some(0) => Err(ReaperError::InvalidInput(
                "inactive_time must be at least 1 second".into(),
            )),
            Some(secs) => {
                let config = self.configs.update(guild_id, |c| c.inactive_time = secs)?;
                tracing::info!(guild = %guild_id, actor = %actor, inactive_time = secs, "Guild config updated");
                Ok(ConfigReply {
                    guild_id,
                    config,
                    updated: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild::ThreadId;
    use crate::moderation::reaper::ThreadReaper;
    use crate::storage::kv::KvStore;
    use crate::test_helpers::*;

    struct Fixture {
        platform: Arc<MemoryPlatform>,
        kv: Arc<MemoryKvStore>,
        handler: CommandHandler,
    }

    fn fixture() -> Fixture {
        let platform = MemoryPlatform::new();
        let kv = Arc::new(MemoryKvStore::default());
        let configs = Arc::new(ConfigStore::new(kv.clone()));
        let reaper = Arc::new(ThreadReaper::new(platform.clone(), configs.clone()));
        let scheduler = Arc::new(SweepScheduler::new(reaper));
        let handler = CommandHandler::new(platform.clone(), configs, scheduler);
        platform.grant_admin(GuildId(10), UserId(1));
        Fixture { platform, kv, handler }
    }

    #[test]
    fn test_non_admin_cannot_configure() {
        let f = fixture();
        let err = f
            .handler
            .configure(GuildId(10), UserId(2), Some(60))
            .unwrap_err();
        assert!(matches!(err, ReaperError::PermissionDenied { .. }));
        // Not even the default record was created.
        assert!(f.kv.keys().unwrap().is_empty());
    }

    #[test]
    fn test_non_admin_cannot_sweep() {
        let f = fixture();
        f.platform.add_thread(ThreadBuilder::new(1, 10).build(), None);
        let err = f.handler.sweep_now(GuildId(10), UserId(2), &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, ReaperError::PermissionDenied { .. }));
        assert!(!f.platform.is_archived(ThreadId(1)));
    }

    #[test]
    fn test_admin_in_other_guild_is_denied() {
        let f = fixture();
        let err = f.handler.configure(GuildId(11), UserId(1), None).unwrap_err();
        assert!(matches!(err, ReaperError::PermissionDenied { .. }));
    }

    #[test]
    fn test_view_returns_default() {
        let f = fixture();
        let reply = f.handler.configure(GuildId(10), UserId(1), None).unwrap();
        assert_eq!(reply.config, GuildConfig::default());
        assert!(!reply.updated);
        assert!(reply.render().contains("inactive_time = 86400s (1d)"));
    }

    #[test]
    fn test_set_persists_and_echoes() {
        let f = fixture();
        let reply = f.handler.configure(GuildId(10), UserId(1), Some(7200)).unwrap();
        assert!(reply.updated);
        assert_eq!(reply.config.inactive_time, 7200);
        assert!(reply.render().contains("(2h)"));

        let again = f.handler.configure(GuildId(10), UserId(1), None).unwrap();
        assert_eq!(again.config.inactive_time, 7200);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let f = fixture();
        let err = f.handler.configure(GuildId(10), UserId(1), Some(0)).unwrap_err();
        assert!(matches!(err, ReaperError::InvalidInput(_)));
        let reply = f.handler.configure(GuildId(10), UserId(1), None).unwrap();
        assert_eq!(reply.config, GuildConfig::default());
    }

    #[test]
    fn test_write_failure_surfaces() {
        let f = fixture();
        f.kv.fail_writes(true);
        let err = f.handler.configure(GuildId(10), UserId(1), Some(60)).unwrap_err();
        assert!(matches!(err, ReaperError::ConfigWrite { .. }));
    }

    #[test]
    fn test_sweep_now_runs_full_sweep() {
        let f = fixture();
        f.platform.add_thread(ThreadBuilder::new(1, 10).build(), None);
        f.platform.add_thread(ThreadBuilder::new(2, 20).build(), None);
        match f.handler.sweep_now(GuildId(10), UserId(1), &AtomicBool::new(true)).unwrap() {
            SweepOutcome::Completed(report) => assert_eq!(report.archived, 2),
            SweepOutcome::AlreadyRunning => panic!("no sweep was running"),
        }
    }

    #[test]
    fn test_sweep_now_stops_on_shutdown() {
        let f = fixture();
        f.platform.add_thread(ThreadBuilder::new(1, 10).build(), None);
        f.platform.add_thread(ThreadBuilder::new(2, 20).build(), None);
        match f.handler.sweep_now(GuildId(10), UserId(1), &AtomicBool::new(false)).unwrap() {
            SweepOutcome::Completed(report) => {
                assert_eq!(report.guilds, 0);
                assert_eq!(report.archived, 0);
            }
            SweepOutcome::AlreadyRunning => panic!("no sweep was running"),
        }
        assert!(!f.platform.is_archived(ThreadId(1)));
        assert!(!f.platform.is_archived(ThreadId(2)));
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize_secs(45), "45s");
        assert_eq!(humanize_secs(120), "2m");
        assert_eq!(humanize_secs(90), "90s");
        assert_eq!(humanize_secs(172_800), "2d");
    }
}
