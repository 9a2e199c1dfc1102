//! The frame pipeline.
//!
//! Two long-lived worker threads joined by a bounded handoff queue:
//!
//! ```text
//! FrameSource -> capture loop -> HandoffQueue -> process loop -> latest frame
//!                (fit, pace)                     (detect, annotate, notify)
//! ```
//!
//! Each loop parks on its own `Gate` while disabled. One `CancelFlag` ends both
//! loops; every blocking wait re-checks it under the mutex it waits on.
//! `PipelineEngine` owns the threads and exposes the lifecycle operations.
//!
//! Lock order: lifecycle -> source slot -> queue / gates / published frame /
//! window. Worker threads never hold the source slot while blocked on the
//! queue or a gate.

mod cancel;
mod capture;
mod engine;
mod gate;
mod process;
mod queue;
mod stats;
mod timer;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use cancel::CancelFlag;
pub use engine::{EngineOptions, LatestFrame, PipelineEngine, PipelineState};
pub use gate::Gate;
pub use queue::{Aborted, HandoffQueue, DEFAULT_QUEUE_CAPACITY};
pub use stats::PipelineStats;
pub use timer::{frame_interval, PacingTimer};

/// Lock `mutex`, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
