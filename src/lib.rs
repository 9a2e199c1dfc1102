//! Presence pipeline
//!
//! Real-time frame pipeline: a capture thread pulls frames from a video
//! source, a process thread runs object detection on them, and the newest
//! annotated frame is published for a display layer to poll.
//!
//! # Architecture
//!
//! - Capture and process run on two long-lived threads joined by a bounded
//!   handoff queue (one frame by default). Capture blocks rather than drops.
//! - Each loop can be paused independently through its gate without losing
//!   its thread.
//! - Capture is paced to the source's own frame rate without busy-waiting.
//! - Sources can be swapped or removed at any time; end of stream tears the
//!   source down and the engine waits for a new one.
//! - Shutdown wakes every blocked wait and joins both threads.
//!
//! # Module Structure
//!
//! - `pipeline`: queue, gates, capture/process loops, `PipelineEngine`
//! - `frame`: `Frame` and display fitting
//! - `ingest`: frame sources (synthetic, V4L2, FFmpeg)
//! - `detect`: detectors (motion, tract/ONNX)
//! - `annotate`, `notify`: drawing and notification collaborators
//! - `config`: `presenced` configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod notify;
pub mod pipeline;

pub use annotate::Annotator;
pub use config::PresenceConfig;
pub use detect::{BoundingBox, Detection, Detector, MotionDetector};
pub use error::PipelineError;
pub use frame::{fit_dimensions, Frame, WindowDimensions};
pub use ingest::{DeviceSource, FrameSource, SourceRead, SyntheticSource};
pub use notify::{CooldownNotifier, LogNotifier, Notifier};
pub use pipeline::{
    EngineOptions, LatestFrame, PipelineEngine, PipelineState, PipelineStats,
};
