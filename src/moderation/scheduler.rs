//! Sweep scheduler -- full pass over every guild and thread.
//! Runs once at startup, then every sweep_interval_secs (default 300 = 5 min).
//!
//! Sweeps never overlap: a trigger that arrives while one is running is
//! dropped. No lock is held across the sweep, so event reconciliation keeps
//! going while a sweep is stuck on a slow thread.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::constants::SHUTDOWN_POLL_MS;
use crate::guild::GuildId;
use crate::moderation::reaper::ThreadReaper;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub guilds: usize,
    pub threads_seen: usize,
    pub archived: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was in progress; this trigger was dropped.
    AlreadyRunning,
}

/// Clears the in-progress flag even if the sweep unwinds.
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SweepScheduler {
    reaper: Arc<ThreadReaper>,
    in_progress: AtomicBool,
    completed: AtomicU64,
    dropped: AtomicU64,
    last_report: Mutex<Option<SweepReport>>,
}

impl SweepScheduler {
    pub fn new(reaper: Arc<ThreadReaper>) -> Self {
        Self {
            reaper,
            in_progress: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            last_report: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Run a full sweep now, unless one is already running.
    pub fn sweep(&self) -> SweepOutcome {
        self.sweep_until(&AtomicBool::new(true))
    }

    /// Like [`sweep`](Self::sweep), stopping between guilds once `running` goes false.
    pub fn sweep_until(&self, running: &AtomicBool) -> SweepOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Sweep already in progress, trigger dropped");
            return SweepOutcome::AlreadyRunning;
        }
        let _guard = SweepGuard(&self.in_progress);

        let start = Instant::now();
        let mut report = SweepReport::default();

        let guilds = match self.reaper.platform().list_guilds() {
            Ok(g) => g,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate guilds, sweep aborted");
                report.errors += 1;
                return self.finish(report, start);
            }
        };

        tracing::info!(guild_count = guilds.len(), "Starting sweep");

        for guild_id in guilds {
            if !running.load(Ordering::Relaxed) {
                tracing::info!("Shutdown requested, sweep interrupted");
                break;
            }
            report.guilds += 1;
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                self.sweep_guild(guild_id, &mut report)
            }));
            if result.is_err() {
                report.errors += 1;
                tracing::error!(guild = %guild_id, "Guild sweep panicked. Sweep continues.");
            }
        }

        self.finish(report, start)
    }

    fn sweep_guild(&self, guild_id: GuildId, report: &mut SweepReport) {
        let threads = match self.reaper.platform().list_threads(guild_id) {
            Ok(t) => t,
            Err(e) => {
                report.errors += 1;
                tracing::warn!(guild = %guild_id, error = %e, "Failed to list threads, guild skipped");
                return;
            }
        };

        tracing::debug!(guild = %guild_id, thread_count = threads.len(), "Sweeping guild");

        for thread in &threads {
            report.threads_seen += 1;
            match self.reaper.reconcile(thread) {
                Ok(r) if r.archived() => report.archived += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(
                        guild = %guild_id,
                        thread_id = %thread.id,
                        error = %e,
                        "Thread reconciliation failed, retrying next sweep"
                    );
                }
            }
        }
    }

    fn finish(&self, mut report: SweepReport, start: Instant) -> SweepOutcome {
        report.duration_ms = start.elapsed().as_millis() as u64;
        self.completed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            guilds = report.guilds,
            threads = report.threads_seen,
            archived = report.archived,
            errors = report.errors,
            duration_ms = report.duration_ms,
            "Sweep complete"
        );
        if let Ok(mut last) = self.last_report.lock() {
            *last = Some(report.clone());
        }
        SweepOutcome::Completed(report)
    }

    /// Immediate sweep, then one on every `interval` tick until `running` goes false.
    ///
    /// Ticks stay aligned to the loop start. Ticks that pass while a sweep is
    /// still running are dropped like any other overlapping trigger.
    pub fn run_loop(&self, running: Arc<AtomicBool>, interval: Duration) {
        tracing::info!(interval_secs = interval.as_secs(), "Sweep loop started");
        let interval = interval.max(Duration::from_millis(1));
        let poll = Duration::from_millis(SHUTDOWN_POLL_MS);
        let mut next = Instant::now();

        while running.load(Ordering::Relaxed) {
            self.sweep_until(&running);

            next += interval;
            let now = Instant::now();
            if now > next {
                let missed = ((now - next).as_nanos() / interval.as_nanos()) as u32 + 1;
                next += interval * missed;
                self.dropped.fetch_add(missed as u64, Ordering::Relaxed);
                tracing::warn!(missed, "Sweep overran its interval, missed ticks dropped");
            }

            loop {
                let now = Instant::now();
                if !running.load(Ordering::Relaxed) || now >= next {
                    break;
                }
                std::thread::sleep(poll.min(next - now));
            }
        }

        tracing::info!("Sweep loop stopped");
    }

    pub fn stats(&self) -> serde_json::Value {
        let last = self.last_report.lock().ok().and_then(|r| r.clone());
        serde_json::json!({
            "running": self.is_running(),
            "completed": self.completed.load(Ordering::Relaxed),
            "dropped_triggers": self.dropped.load(Ordering::Relaxed),
            "last_report": last,
        })
    }
}
