pub mod commands;
pub mod daemon;
pub mod mirror;
pub mod notify;
pub mod threads;

use std::sync::Arc;

use anyhow::{Context, Result};

use thread_reaper::config::DaemonConfig;
use thread_reaper::moderation::commands::CommandHandler;
use thread_reaper::moderation::reaper::ThreadReaper;
use thread_reaper::moderation::scheduler::SweepScheduler;
use thread_reaper::platform::local::LocalPlatform;
use thread_reaper::storage::config_store::ConfigStore;
use thread_reaper::storage::database::ConnectionRole;

/// Open the platform mirror the daemon reads from.
pub fn open_mirror(config: &DaemonConfig) -> Result<Arc<LocalPlatform>> {
    let path = config.platform_db_path();
    let platform = LocalPlatform::open(&path, ConnectionRole::Cli)
        .with_context(|| format!("Failed to open platform mirror {}", path.display()))?;
    Ok(Arc::new(platform))
}

/// In-process pipeline, used when no daemon is reachable.
pub struct LocalPipeline {
    pub platform: Arc<LocalPlatform>,
    pub reaper: Arc<ThreadReaper>,
    pub commands: CommandHandler,
}

pub fn local_pipeline() -> Result<LocalPipeline> {
    let config = DaemonConfig::load();
    let platform = open_mirror(&config)?;
    let configs = Arc::new(
        ConfigStore::open(config.config_backend).context("Failed to open guild config store")?,
    );
    let reaper = Arc::new(ThreadReaper::new(platform.clone(), configs.clone()));
    let scheduler = Arc::new(SweepScheduler::new(reaper.clone()));
    let commands = CommandHandler::new(platform.clone(), configs, scheduler);
    Ok(LocalPipeline {
        platform,
        reaper,
        commands,
    })
}
