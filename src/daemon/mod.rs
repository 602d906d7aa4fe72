pub mod ipc_server;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use thread_reaper::config::DaemonConfig;
use thread_reaper::moderation::commands::CommandHandler;
use thread_reaper::moderation::reaper::ThreadReaper;
use thread_reaper::moderation::reconciler::EventQueue;
use thread_reaper::moderation::scheduler::SweepScheduler;
use thread_reaper::platform::local::LocalPlatform;
use thread_reaper::platform::Platform;
use thread_reaper::storage::config_store::ConfigStore;
use thread_reaper::storage::database::ConnectionRole;
use thread_reaper::storage::path_utils;

/// Everything the IPC handlers need, shared across connection threads.
pub struct DaemonContext {
    pub config: DaemonConfig,
    pub commands: CommandHandler,
    pub configs: Arc<ConfigStore>,
    pub scheduler: Arc<SweepScheduler>,
    pub events: EventQueue,
    pub running: Arc<AtomicBool>,
    pub start_time: Instant,
}

/// Run the daemon in the foreground.
///
/// Architecture:
///   - Sweep loop: 1 thread, immediate sweep then every `sweep_interval_secs`
///   - Event queue: N worker threads reconciling single threads
///   - IPC server: 1 listener thread, 1 thread per connection
pub fn run() -> Result<()> {
    thread_reaper::tracing_init::init_global_tracing();

    let config = DaemonConfig::load();
    tracing::info!(
        sweep_interval_secs = config.sweep_interval_secs,
        event_workers = config.event_workers,
        event_queue_capacity = config.event_queue_capacity,
        config_backend = ?config.config_backend,
        "Starting thread-reaper daemon"
    );

    let data_dir = path_utils::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

    let platform_path = config.platform_db_path();
    let platform: Arc<dyn Platform> = Arc::new(
        LocalPlatform::open(&platform_path, ConnectionRole::Daemon)
            .with_context(|| format!("Failed to open platform mirror {}", platform_path.display()))?,
    );
    let configs = Arc::new(
        ConfigStore::open(config.config_backend).context("Failed to open guild config store")?,
    );

    let reaper = Arc::new(ThreadReaper::new(platform.clone(), configs.clone()));
    let scheduler = Arc::new(SweepScheduler::new(reaper.clone()));
    let events = EventQueue::new(reaper, config.event_workers, config.event_queue_capacity)
        .context("Failed to start event workers")?;
    let commands = CommandHandler::new(platform, configs.clone(), scheduler.clone());

    let running = Arc::new(AtomicBool::new(true));
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs.max(1));

    let ctx = Arc::new(DaemonContext {
        config,
        commands,
        configs,
        scheduler: scheduler.clone(),
        events,
        running: running.clone(),
        start_time: Instant::now(),
    });

    let pid_path = path_utils::pid_path();
    std::fs::write(&pid_path, std::process::id().to_string()).ok();

    let socket_path = path_utils::socket_path();
    let ipc_handle = {
        let ctx = ctx.clone();
        let sock = socket_path.clone();
        std::thread::Builder::new()
            .name("ipc-listener".into())
            .spawn(move || {
                if let Err(e) = ipc_server::run(&sock, ctx) {
                    tracing::error!("IPC server error: {}", e);
                }
            })
            .context("Failed to spawn IPC thread")?
    };

    let sweep_handle = {
        let running = running.clone();
        std::thread::Builder::new()
            .name("sweep-loop".into())
            .spawn(move || scheduler.run_loop(running, sweep_interval))
            .context("Failed to spawn sweep thread")?
    };

    // signal-hook raises a flag; `running` is lowered once it does.
    let terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, terminate.clone()).ok();
    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::SIGTERM, terminate.clone()).ok();

    while running.load(Ordering::Relaxed) {
        if terminate.load(Ordering::Relaxed) {
            tracing::info!("Termination signal received");
            running.store(false, Ordering::Relaxed);
            break;
        }
        std::thread::sleep(Duration::from_millis(thread_reaper::constants::SHUTDOWN_POLL_MS));
    }

    tracing::info!("Shutting down...");

    ipc_server::wake(&socket_path);
    let _ = ipc_handle.join();
    let _ = sweep_handle.join();

    // The IPC server joined its connection threads, so this is the last reference.
    match Arc::try_unwrap(ctx) {
        Ok(ctx) => ctx.events.shutdown(),
        Err(_) => tracing::warn!("Daemon context still referenced, event workers stop when the channel drops"),
    }

    let _ = std::fs::remove_file(&pid_path);
    tracing::info!("Daemon shutdown complete");
    Ok(())
}
