//! Identifier-routed frame source.
//!
//! `DeviceSource` is what the daemon hands to the engine. On every `open` it
//! picks a backend from the identifier:
//!
//! - `stub://...`       synthetic frames (always available)
//! - `/dev/video*`      V4L2 capture device (feature: ingest-v4l2)
//! - anything else      file path or stream URL via FFmpeg (feature: ingest-file-ffmpeg)

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::ffmpeg::FfmpegSource;
use super::source::{FrameSource, SourceRead};
use super::synthetic::{SyntheticSource, STUB_SCHEME};
#[cfg(feature = "ingest-v4l2")]
use super::v4l2::V4l2Source;

/// Backend chosen for an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    V4l2,
    Ffmpeg,
}

impl SourceKind {
    pub fn for_identifier(identifier: &str) -> Self {
        if identifier.starts_with(STUB_SCHEME) {
            SourceKind::Synthetic
        } else if identifier.starts_with("/dev/video") {
            SourceKind::V4l2
        } else {
            SourceKind::Ffmpeg
        }
    }
}

enum DeviceBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-v4l2")]
    V4l2(V4l2Source),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegSource),
}

/// Frame source that switches backend per identifier.
#[derive(Default)]
pub struct DeviceSource {
    backend: Option<DeviceBackend>,
}

impl DeviceSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_backend(identifier: &str) -> Result<DeviceBackend> {
        if identifier.trim().is_empty() {
            return Err(anyhow!("video source identifier is empty"));
        }
        match SourceKind::for_identifier(identifier) {
            SourceKind::Synthetic => Ok(DeviceBackend::Synthetic(SyntheticSource::new())),
            SourceKind::V4l2 => {
                #[cfg(feature = "ingest-v4l2")]
                {
                    Ok(DeviceBackend::V4l2(V4l2Source::default()))
                }
                #[cfg(not(feature = "ingest-v4l2"))]
                {
                    Err(anyhow!(
                        "capture device {} requires the ingest-v4l2 feature",
                        identifier
                    ))
                }
            }
            SourceKind::Ffmpeg => {
                #[cfg(feature = "ingest-file-ffmpeg")]
                {
                    Ok(DeviceBackend::Ffmpeg(FfmpegSource::new()))
                }
                #[cfg(not(feature = "ingest-file-ffmpeg"))]
                {
                    Err(anyhow!(
                        "video input {} requires the ingest-file-ffmpeg feature",
                        identifier
                    ))
                }
            }
        }
    }
}

impl FrameSource for DeviceSource {
    fn name(&self) -> &'static str {
        match &self.backend {
            None => "device",
            Some(DeviceBackend::Synthetic(source)) => source.name(),
            #[cfg(feature = "ingest-v4l2")]
            Some(DeviceBackend::V4l2(source)) => source.name(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            Some(DeviceBackend::Ffmpeg(source)) => source.name(),
        }
    }

    fn open(&mut self, identifier: &str) -> Result<()> {
        self.close();
        let mut backend = Self::build_backend(identifier)?;
        match &mut backend {
            DeviceBackend::Synthetic(source) => source.open(identifier)?,
            #[cfg(feature = "ingest-v4l2")]
            DeviceBackend::V4l2(source) => source.open(identifier)?,
            #[cfg(feature = "ingest-file-ffmpeg")]
            DeviceBackend::Ffmpeg(source) => source.open(identifier)?,
        }
        self.backend = Some(backend);
        Ok(())
    }

    fn read(&mut self) -> Result<SourceRead> {
        match &mut self.backend {
            None => Err(anyhow!("no video source is open")),
            Some(DeviceBackend::Synthetic(source)) => source.read(),
            #[cfg(feature = "ingest-v4l2")]
            Some(DeviceBackend::V4l2(source)) => source.read(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            Some(DeviceBackend::Ffmpeg(source)) => source.read(),
        }
    }

    fn frame_rate(&self) -> Option<f64> {
        match &self.backend {
            None => None,
            Some(DeviceBackend::Synthetic(source)) => source.frame_rate(),
            #[cfg(feature = "ingest-v4l2")]
            Some(DeviceBackend::V4l2(source)) => source.frame_rate(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            Some(DeviceBackend::Ffmpeg(source)) => source.frame_rate(),
        }
    }

    fn close(&mut self) {
        match self.backend.take() {
            None => {}
            Some(DeviceBackend::Synthetic(mut source)) => source.close(),
            #[cfg(feature = "ingest-v4l2")]
            Some(DeviceBackend::V4l2(mut source)) => source.close(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            Some(DeviceBackend::Ffmpeg(mut source)) => source.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_identifiers_by_scheme() {
        assert_eq!(
            SourceKind::for_identifier("stub://porch"),
            SourceKind::Synthetic
        );
        assert_eq!(SourceKind::for_identifier("/dev/video0"), SourceKind::V4l2);
        assert_eq!(
            SourceKind::for_identifier("/var/lib/clips/door.mp4"),
            SourceKind::Ffmpeg
        );
        assert_eq!(
            SourceKind::for_identifier("rtsp://10.0.0.4/stream"),
            SourceKind::Ffmpeg
        );
    }

    #[test]
    fn swaps_between_synthetic_streams() -> Result<()> {
        let mut source = DeviceSource::new();
        source.open("stub://a?fps=5")?;
        assert_eq!(source.frame_rate(), Some(5.0));
        assert!(matches!(source.read()?, SourceRead::Frame(_)));

        source.open("stub://b?fps=20")?;
        assert_eq!(source.frame_rate(), Some(20.0));

        source.close();
        assert_eq!(source.frame_rate(), None);
        assert!(source.read().is_err());
        Ok(())
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let mut source = DeviceSource::new();
        assert!(source.open("  ").is_err());
        assert_eq!(source.frame_rate(), None);
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn missing_feature_is_reported() {
        let mut source = DeviceSource::new();
        let err = source.open("/tmp/clip.mp4").unwrap_err();
        assert!(err.to_string().contains("ingest-file-ffmpeg"));
    }
}
