//! Lifecycle controller: owns the worker threads, the active source and the
//! published frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::annotate::Annotator;
use crate::detect::Detector;
use crate::error::PipelineError;
use crate::frame::{Frame, WindowDimensions};
use crate::ingest::{FrameSource, SourceRead};
use crate::notify::Notifier;

use super::cancel::CancelFlag;
use super::gate::Gate;
use super::queue::{HandoffQueue, DEFAULT_QUEUE_CAPACITY};
use super::stats::{PipelineStats, StatCounters};
use super::timer::frame_interval;
use super::{capture, lock, process};

/// Where the engine is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// No source is open. Initial state, and the state after any teardown.
    NoSource,
    /// A source is open and capturing, but the process gate is closed.
    Paused,
    /// A source is open and both loops run.
    Processing,
    ShuttingDown,
    /// Terminal.
    Shutdown,
}

impl PipelineState {
    pub fn has_source(self) -> bool {
        matches!(self, PipelineState::Paused | PipelineState::Processing)
    }
}

/// Result of [`PipelineEngine::get_latest_frame`].
#[derive(Debug)]
pub struct LatestFrame {
    /// Whether a source is open and believed healthy.
    pub source_live: bool,
    /// The newest annotated frame, if one was published since the last read.
    pub frame: Option<Frame>,
}

/// Construction-time settings.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub queue_capacity: usize,
    pub window: WindowDimensions,
    pub annotator: Annotator,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            window: WindowDimensions::default(),
            annotator: Annotator::default(),
        }
    }
}

/// A queued frame tagged with the source generation that produced it.
pub(crate) struct Captured {
    pub(crate) frame: Frame,
    pub(crate) generation: u64,
}

/// One `read()` taken from the active source.
pub(crate) struct SourceTick {
    pub(crate) read: anyhow::Result<SourceRead>,
    pub(crate) generation: u64,
    pub(crate) interval: Option<Duration>,
}

struct SourceSlot {
    source: Box<dyn FrameSource>,
    identifier: Option<String>,
    frame_interval: Option<Duration>,
    /// Bumped on every open and every teardown.
    generation: u64,
}

struct Published {
    latest: Option<Frame>,
    source_live: bool,
}

/// State shared by the engine handle and both worker threads.
pub(crate) struct Shared {
    pub(crate) cancel: CancelFlag,
    pub(crate) queue: HandoffQueue<Captured>,
    pub(crate) capture_gate: Gate,
    pub(crate) process_gate: Gate,
    pub(crate) stats: StatCounters,
    source: Mutex<SourceSlot>,
    live_generation: AtomicU64,
    lifecycle: Mutex<PipelineState>,
    published: Mutex<Published>,
    window: Mutex<WindowDimensions>,
}

impl Shared {
    fn new(source: Box<dyn FrameSource>, capacity: usize, window: WindowDimensions) -> Self {
        let cancel = CancelFlag::new();
        Self {
            queue: HandoffQueue::new(capacity, cancel.clone()),
            capture_gate: Gate::new("capture", cancel.clone()),
            process_gate: Gate::new("process", cancel.clone()),
            cancel,
            stats: StatCounters::default(),
            source: Mutex::new(SourceSlot {
                source,
                identifier: None,
                frame_interval: None,
                generation: 0,
            }),
            live_generation: AtomicU64::new(0),
            lifecycle: Mutex::new(PipelineState::NoSource),
            published: Mutex::new(Published {
                latest: None,
                source_live: false,
            }),
            window: Mutex::new(window),
        }
    }

    fn slot(&self) -> MutexGuard<'_, SourceSlot> {
        lock(&self.source)
    }

    fn state(&self) -> MutexGuard<'_, PipelineState> {
        lock(&self.lifecycle)
    }

    pub(crate) fn window(&self) -> WindowDimensions {
        *lock(&self.window)
    }

    /// Whether frames of `generation` come from the source that is open now.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.live_generation.load(Ordering::SeqCst) == generation
    }

    /// Read once from the active source. `None` when no source is open.
    ///
    /// The source slot is held only for the duration of the read.
    pub(crate) fn read_source(&self) -> Option<SourceTick> {
        let mut slot = self.slot();
        slot.identifier.as_ref()?;
        let generation = slot.generation;
        let interval = slot.frame_interval;
        let read = slot.source.read();
        Some(SourceTick {
            read,
            generation,
            interval,
        })
    }

    /// Store `frame` as the latest frame unless its source was retired while it
    /// was in flight. Returns whether the frame was published.
    ///
    /// The generation is compared under the published lock, and `teardown`
    /// retires the generation before it takes that lock, so a stale frame can
    /// never outlive the teardown that retired it.
    pub(crate) fn publish(&self, frame: Frame, generation: u64) -> bool {
        let mut published = lock(&self.published);
        if !self.is_current(generation) {
            return false;
        }
        let overwrote_unread = published.latest.replace(frame).is_some();
        self.stats.published(overwrote_unread);
        true
    }

    /// End-of-stream or read failure seen by the capture loop.
    ///
    /// Tears the source down unless it was already replaced or removed, or the
    /// engine is shutting down.
    pub(crate) fn source_lost(&self, generation: u64) {
        let mut state = self.state();
        if matches!(
            *state,
            PipelineState::ShuttingDown | PipelineState::Shutdown
        ) {
            return;
        }
        let mut slot = self.slot();
        if slot.generation != generation || slot.identifier.is_none() {
            return;
        }
        self.teardown(&mut slot, "source lost");
        *state = PipelineState::NoSource;
    }

    /// The single recovery procedure: stop processing, close the capture gate,
    /// clear the queue, close the source, clear the status and any unread frame.
    fn teardown(&self, slot: &mut SourceSlot, reason: &str) {
        self.process_gate.close();
        self.capture_gate.close();
        let dropped = self.queue.clear();

        if let Some(identifier) = slot.identifier.take() {
            slot.source.close();
            self.stats.torn_down();
            log::info!(
                "video source {} torn down ({}), {} queued frame(s) dropped",
                identifier,
                reason,
                dropped
            );
        }
        slot.frame_interval = None;
        slot.generation += 1;
        self.live_generation.store(slot.generation, Ordering::SeqCst);

        let mut published = lock(&self.published);
        published.source_live = false;
        published.latest = None;
    }

    fn wake_all(&self) {
        self.capture_gate.wake_all();
        self.process_gate.wake_all();
        self.queue.wake_all();
    }
}

#[derive(Default)]
struct Workers {
    capture: Option<JoinHandle<()>>,
    process: Option<JoinHandle<()>>,
}

/// Capture/process pipeline with a dynamically swappable source.
///
/// All methods take `&self`; the engine can be shared across threads (for
/// example behind an `Arc`) and every operation is safe to call while a
/// capture or process iteration is in flight. Dropping the engine shuts it
/// down.
pub struct PipelineEngine {
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
}

impl PipelineEngine {
    /// Spawn the capture and process threads. Both start idle, with no source.
    ///
    /// `source` is opened, closed and re-opened by the engine as identifiers
    /// come and go. `detector` and `notifier` run on the process thread.
    pub fn start(
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        notifier: Box<dyn Notifier>,
        options: EngineOptions,
    ) -> Result<Self, PipelineError> {
        let shared = Arc::new(Shared::new(
            source,
            options.queue_capacity,
            options.window,
        ));

        let capture = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("pipeline-capture".to_string())
                .spawn(move || capture::run(&shared))
                .map_err(PipelineError::Spawn)?
        };

        let process = {
            let shared = Arc::clone(&shared);
            let annotator = options.annotator;
            thread::Builder::new()
                .name("pipeline-process".to_string())
                .spawn(move || process::run(&shared, detector, annotator, notifier))
        };
        let process = match process {
            Ok(handle) => handle,
            Err(err) => {
                shared.cancel.raise();
                shared.wake_all();
                if capture.join().is_err() {
                    log::warn!("capture worker panicked during aborted start");
                }
                return Err(PipelineError::Spawn(err));
            }
        };

        log::info!(
            "pipeline started (queue capacity {})",
            shared.queue.capacity()
        );
        Ok(Self {
            shared,
            workers: Mutex::new(Workers {
                capture: Some(capture),
                process: Some(process),
            }),
        })
    }

    /// Replace the active source with `identifier`.
    ///
    /// Any current source is torn down first. On failure the new source is
    /// closed again and the engine stays in [`PipelineState::NoSource`].
    pub fn set_video_source(&self, identifier: &str) -> Result<(), PipelineError> {
        let shared = &self.shared;
        let mut state = shared.state();
        ensure_running(*state)?;

        let mut slot = shared.slot();
        shared.teardown(&mut slot, "source change");
        *state = PipelineState::NoSource;

        if let Err(reason) = slot.source.open(identifier) {
            slot.source.close();
            log::warn!("failed to open video source {}: {:#}", identifier, reason);
            return Err(PipelineError::SourceOpen {
                identifier: identifier.to_string(),
                reason,
            });
        }

        let Some(interval) = slot.source.frame_rate().and_then(frame_interval) else {
            slot.source.close();
            log::warn!(
                "video source {} reports no usable frame rate, closing it",
                identifier
            );
            return Err(PipelineError::FrameRateUnavailable {
                identifier: identifier.to_string(),
            });
        };

        slot.identifier = Some(identifier.to_string());
        slot.frame_interval = Some(interval);
        slot.generation += 1;
        shared
            .live_generation
            .store(slot.generation, Ordering::SeqCst);
        lock(&shared.published).source_live = true;
        drop(slot);

        shared.capture_gate.open();
        shared.process_gate.open();
        *state = PipelineState::Processing;
        log::info!(
            "video source {} active ({} backend, {:?} per frame)",
            identifier,
            self.backend_name(),
            interval
        );
        Ok(())
    }

    /// Tear down the active source. A no-op when there is none.
    pub fn remove_video_source(&self) -> Result<(), PipelineError> {
        let shared = &self.shared;
        let mut state = shared.state();
        ensure_running(*state)?;
        let mut slot = shared.slot();
        shared.teardown(&mut slot, "removed");
        *state = PipelineState::NoSource;
        Ok(())
    }

    /// Open the process gate. Capture is unaffected.
    pub fn start_processing(&self) -> Result<(), PipelineError> {
        let mut state = self.shared.state();
        ensure_running(*state)?;
        self.shared.process_gate.open();
        if *state == PipelineState::Paused {
            *state = PipelineState::Processing;
        }
        Ok(())
    }

    /// Close the process gate. Capture keeps filling the queue up to its
    /// capacity and then blocks.
    pub fn stop_processing(&self) -> Result<(), PipelineError> {
        let mut state = self.shared.state();
        ensure_running(*state)?;
        self.shared.process_gate.close();
        if *state == PipelineState::Processing {
            *state = PipelineState::Paused;
        }
        Ok(())
    }

    /// Change the display budget. Applies from the next captured frame.
    pub fn set_window_dimensions(
        &self,
        max_width: u32,
        max_height: u32,
        min_width: u32,
        min_height: u32,
    ) -> Result<(), PipelineError> {
        let state = self.shared.state();
        ensure_running(*state)?;
        *lock(&self.shared.window) =
            WindowDimensions::new(max_width, max_height, min_width, min_height);
        log::debug!(
            "window dimensions set to max {}x{}, min {}x{}",
            max_width,
            max_height,
            min_width,
            min_height
        );
        Ok(())
    }

    pub fn window_dimensions(&self) -> WindowDimensions {
        self.shared.window()
    }

    /// Take the newest annotated frame, leaving the cell empty.
    ///
    /// Also valid after shutdown, where it reports no source and no frame.
    pub fn get_latest_frame(&self) -> LatestFrame {
        let mut published = lock(&self.shared.published);
        LatestFrame {
            source_live: published.source_live,
            frame: published.latest.take(),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.shared.state()
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.stats.snapshot()
    }

    /// Frames currently buffered between capture and process.
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Identifier of the open source, if any.
    pub fn source_identifier(&self) -> Option<String> {
        self.shared.slot().identifier.clone()
    }

    fn backend_name(&self) -> &'static str {
        self.shared.slot().source.name()
    }

    /// Stop both workers and close the source. Terminal.
    ///
    /// Raises cancellation, opens both gates, wakes the queue, joins capture,
    /// wakes the queue again, then joins process. A second call returns
    /// [`PipelineError::ShutDown`].
    pub fn shutdown(&self) -> Result<(), PipelineError> {
        let shared = &self.shared;
        {
            let mut state = shared.state();
            ensure_running(*state)?;
            *state = PipelineState::ShuttingDown;
        }
        log::info!("pipeline shutting down");

        shared.cancel.raise();
        shared.capture_gate.open();
        shared.process_gate.open();
        shared.queue.wake_all();

        let mut workers = lock(&self.workers);
        let capture = join_worker(workers.capture.take(), "capture");
        log::debug!("capture worker joined");
        shared.queue.wake_all();
        let process = join_worker(workers.process.take(), "process");
        log::debug!("process worker joined");
        drop(workers);

        {
            let mut slot = shared.slot();
            if let Some(identifier) = slot.identifier.take() {
                slot.source.close();
                log::info!("video source {} closed on shutdown", identifier);
            }
            slot.frame_interval = None;
            slot.generation += 1;
            shared
                .live_generation
                .store(slot.generation, Ordering::SeqCst);
        }
        shared.queue.clear();
        {
            let mut published = lock(&shared.published);
            published.source_live = false;
            published.latest = None;
        }

        *shared.state() = PipelineState::Shutdown;
        log::info!("pipeline shut down");
        capture.and(process)
    }
}

impl Drop for PipelineEngine {
    fn drop(&mut self) {
        if self.state() == PipelineState::Shutdown {
            return;
        }
        if let Err(err) = self.shutdown() {
            log::warn!("pipeline shutdown on drop failed: {}", err);
        }
    }
}

fn ensure_running(state: PipelineState) -> Result<(), PipelineError> {
    match state {
        PipelineState::ShuttingDown | PipelineState::Shutdown => Err(PipelineError::ShutDown),
        _ => Ok(()),
    }
}

fn join_worker(handle: Option<JoinHandle<()>>, name: &'static str) -> Result<(), PipelineError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| PipelineError::WorkerPanicked(name)),
        None => Ok(()),
    }
}
