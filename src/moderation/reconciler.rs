//! Event reconciler -- bounded queue of platform events with a worker pool.
//!
//!   IPC handler → EventQueue::submit(event) → instant reply
//!   N worker threads consume events → handle_event() → ThreadReaper
//!
//! A full queue drops the event with a warning; the next sweep covers it.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

use crate::guild::{GuildId, ThreadId, ThreadState};
use crate::moderation::evaluator::Decision;
use crate::moderation::reaper::ThreadReaper;
use crate::{ReaperError, ReaperResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// Carries the thread's updated state.
    ThreadUpdated { thread: ThreadState },
    /// Carries only the owning thread; its current state is fetched.
    MessageDeleted { guild_id: GuildId, thread_id: ThreadId },
}

impl PlatformEvent {
    pub fn thread_id(&self) -> ThreadId {
        match self {
            Self::ThreadUpdated { thread } => thread.id,
            Self::MessageDeleted { thread_id, .. } => *thread_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ThreadUpdated { .. } => "thread_updated",
            Self::MessageDeleted { .. } => "message_deleted",
        }
    }
}

/// Run the single-thread pipeline for one event.
/// `Ok(None)` when the thread no longer exists.
pub fn handle_event(reaper: &ThreadReaper, event: &PlatformEvent) -> ReaperResult<Option<Decision>> {
    match event {
        PlatformEvent::ThreadUpdated { thread } => reaper.reconcile(thread).map(|r| Some(r.decision)),
        PlatformEvent::MessageDeleted { guild_id, thread_id } => {
            match reaper.reconcile_by_id(*thread_id)? {
                Some(r) => Ok(Some(r.decision)),
                None => {
                    tracing::debug!(guild = %guild_id, thread_id = %thread_id, "Message deleted in unknown thread");
                    Ok(None)
                }
            }
        }
    }
}

struct QueueStats {
    pending: AtomicUsize,
    processed: AtomicU64,
    errors: AtomicU64,
    dropped: AtomicU64,
    workers: usize,
}

pub struct EventQueue {
    tx: SyncSender<PlatformEvent>,
    stats: Arc<QueueStats>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl EventQueue {
    /// Create the queue and spawn `num_workers` consumer threads.
    ///
    /// `capacity`: max buffered events. If full, `submit()` returns Err without blocking.
    pub fn new(reaper: Arc<ThreadReaper>, num_workers: usize, capacity: usize) -> ReaperResult<Self> {
        let num_workers = num_workers.max(1);
        let (tx, rx) = sync_channel::<PlatformEvent>(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(QueueStats {
            pending: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            workers: num_workers,
        });
        let mut handles = Vec::with_capacity(num_workers);

        tracing::info!(workers = num_workers, capacity, "Event queue initialized");

        for worker_id in 0..num_workers {
            let rx = rx.clone();
            let reaper = reaper.clone();
            let stats = stats.clone();

            let handle = std::thread::Builder::new()
                .name(format!("event-worker-{}", worker_id))
                .spawn(move || {
                    tracing::info!(worker_id, "Event worker started");
                    worker_loop(worker_id, rx, reaper, stats);
                    tracing::info!(worker_id, "Event worker stopped");
                })?;
            handles.push(handle);
        }

        Ok(Self {
            tx,
            stats,
            worker_handles: Mutex::new(handles),
        })
    }

    /// Queue an event. Returns immediately; Err hands the event back when the queue is full.
    pub fn submit(&self, event: PlatformEvent) -> Result<(), PlatformEvent> {
        self.stats.pending.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                self.stats.pending.fetch_sub(1, Ordering::Relaxed);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    kind = event.kind(),
                    thread_id = %event.thread_id(),
                    "Event queue full, event dropped until next sweep"
                );
                Err(event)
            }
            Err(TrySendError::Disconnected(event)) => {
                self.stats.pending.fetch_sub(1, Ordering::Relaxed);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Event queue disconnected, workers gone");
                Err(event)
            }
        }
    }

    pub fn queue_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "pending": self.stats.pending.load(Ordering::Relaxed),
            "processed": self.stats.processed.load(Ordering::Relaxed),
            "errors": self.stats.errors.load(Ordering::Relaxed),
            "dropped": self.stats.dropped.load(Ordering::Relaxed),
            "workers": self.stats.workers,
        })
    }

    /// Drop the sender so workers exit after draining, then join them.
    pub fn shutdown(self) {
        drop(self.tx);

        if let Ok(mut handles) = self.worker_handles.lock() {
            tracing::info!(count = handles.len(), "Waiting for event workers to finish");
            for handle in handles.drain(..) {
                let _ = handle.join();
            }
            tracing::info!("All event workers stopped");
        }
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<Receiver<PlatformEvent>>>,
    reaper: Arc<ThreadReaper>,
    stats: Arc<QueueStats>,
) {
    loop {
        let event = {
            let rx_guard = match rx.lock() {
                Ok(g) => g,
                Err(_) => {
                    tracing::error!(worker_id, "Receiver mutex poisoned, worker exiting");
                    return;
                }
            };
            match rx_guard.recv() {
                Ok(event) => event,
                Err(_) => return,
            }
        };

        stats.pending.fetch_sub(1, Ordering::Relaxed);

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| handle_event(&reaper, &event)))
            .unwrap_or_else(|_| Err(ReaperError::Storage("event handler panicked".into())));

        match result {
            Ok(decision) => {
                stats.processed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    worker_id,
                    kind = event.kind(),
                    thread_id = %event.thread_id(),
                    decision = ?decision.map(|d| d.label()),
                    "Event reconciled"
                );
            }
            Err(e) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    worker_id,
                    kind = event.kind(),
                    thread_id = %event.thread_id(),
                    error = %e,
                    "Event reconciliation failed, next sweep will retry"
                );
            }
        }
    }
}
