use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the engine counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames pushed into the handoff queue.
    pub frames_captured: u64,
    /// Frames popped and run through the detector.
    pub frames_processed: u64,
    /// Annotated frames written to the latest-frame cell.
    pub frames_published: u64,
    /// Published frames replaced before the display layer read them.
    pub frames_overwritten: u64,
    /// Notifier invocations.
    pub notifications: u64,
    /// Source teardowns (explicit removal, swap, or end of stream).
    pub source_teardowns: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    frames_captured: AtomicU64,
    frames_processed: AtomicU64,
    frames_published: AtomicU64,
    frames_overwritten: AtomicU64,
    notifications: AtomicU64,
    source_teardowns: AtomicU64,
}

impl StatCounters {
    pub(crate) fn captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn published(&self, overwrote_unread: bool) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        if overwrote_unread {
            self.frames_overwritten.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn notified(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn torn_down(&self) {
        self.source_teardowns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_overwritten: self.frames_overwritten.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            source_teardowns: self.source_teardowns.load(Ordering::Relaxed),
        }
    }
}
