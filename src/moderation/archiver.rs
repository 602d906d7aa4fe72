//! Archiver -- issues the archive mutation for threads judged inactive.

use std::sync::Arc;

use crate::constants::ARCHIVE_REASON;
use crate::guild::ThreadId;
use crate::platform::{ArchiveOutcome, Platform};
use crate::ReaperResult;

pub struct Archiver {
    platform: Arc<dyn Platform>,
}

impl Archiver {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Archive `thread_id`. Archiving an already-archived thread is a no-op,
    /// so a sweep racing an event for the same thread is harmless.
    pub fn archive(&self, thread_id: ThreadId) -> ReaperResult<ArchiveOutcome> {
        let outcome = self.platform.archive_thread(thread_id, ARCHIVE_REASON)?;
        match outcome {
            ArchiveOutcome::Applied => {
                tracing::info!(thread_id = %thread_id, reason = ARCHIVE_REASON, "Thread archived");
            }
            ArchiveOutcome::AlreadyArchived => {
                tracing::debug!(thread_id = %thread_id, "Thread already archived, nothing to do");
            }
        }
        Ok(outcome)
    }
}
