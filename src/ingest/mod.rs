//! Frame sources.
//!
//! This module provides the sources the capture loop pulls from:
//! - Synthetic `stub://` streams (testing, demos)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//! - Local files and stream URLs through FFmpeg (feature: ingest-file-ffmpeg)
//! - `DeviceSource`, which routes an identifier to one of the above
//!
//! Sources only decode. Resizing, queueing and pacing belong to the pipeline.

mod device;
#[cfg(feature = "ingest-file-ffmpeg")]
pub mod ffmpeg;
mod source;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use device::{DeviceSource, SourceKind};
#[cfg(feature = "ingest-file-ffmpeg")]
pub use ffmpeg::FfmpegSource;
pub use source::{FrameSource, SourceRead};
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};
