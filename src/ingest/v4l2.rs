//! V4L2 capture devices (`/dev/videoN`).
//!
//! Requests packed RGB24 at the configured size; drivers that refuse keep their
//! current format and frames that are not RGB24-sized are skipped as misses.

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use super::source::{FrameSource, SourceRead};
use crate::frame::Frame;

/// Requested capture parameters.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    pub width: u32,
    pub height: u32,
    /// Frame rate asked of the driver. The driver's answer is what gets reported.
    pub target_fps: u32,
    pub buffers: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 30,
            buffers: 4,
        }
    }
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// V4L2 frame source.
#[derive(Default)]
pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    device_path: Option<String>,
    active_width: u32,
    active_height: u32,
    fps: Option<f64>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn open(&mut self, identifier: &str) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        self.close();

        let mut device = v4l::Device::with_path(identifier)
            .with_context(|| format!("open v4l2 device {}", identifier))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Source: failed to set format on {}: {}", identifier, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", identifier, err);
            }
        }

        // Frame interval as reported back by the driver (seconds per frame).
        self.fps = device.params().ok().and_then(|params| {
            let interval = params.interval;
            if interval.numerator == 0 || interval.denominator == 0 {
                None
            } else {
                Some(interval.denominator as f64 / interval.numerator as f64)
            }
        });

        let buffers = self.config.buffers.max(1);
        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, buffers)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        self.active_width = format.width;
        self.active_height = format.height;
        self.state = Some(state);
        self.device_path = Some(identifier.to_string());

        log::info!(
            "V4l2Source: opened {} ({}x{}, fps={:?})",
            identifier,
            self.active_width,
            self.active_height,
            self.fps
        );
        Ok(())
    }

    fn read(&mut self) -> Result<SourceRead> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not open")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .context("capture v4l2 frame")?;

        let expected = self.active_width as usize * self.active_height as usize * 3;
        if buf.len() < expected {
            log::trace!(
                "V4l2Source: short buffer ({} of {} bytes), skipping",
                buf.len(),
                expected
            );
            return Ok(SourceRead::Empty);
        }
        let frame = Frame::from_rgb(
            self.active_width,
            self.active_height,
            buf[..expected].to_vec(),
        )?;
        Ok(SourceRead::Frame(frame))
    }

    fn frame_rate(&self) -> Option<f64> {
        self.state.as_ref().and(self.fps)
    }

    fn close(&mut self) {
        self.state = None;
        self.fps = None;
        if let Some(path) = self.device_path.take() {
            log::info!("V4l2Source: closed {}", path);
        }
    }
}
