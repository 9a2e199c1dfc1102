//! Synthetic frame source (`stub://` identifiers).
//!
//! Renders a flat background with a bright square that moves a few pixels per
//! frame, so the motion detector and the whole pipeline can run without a
//! camera. Query parameters tune it:
//!
//! - `fps` (default 10): reported frame rate; `0` reports no rate at all.
//! - `width` / `height` (default 640x480).
//! - `frames` (default unlimited): report end of stream after this many frames.
//! - `object` (default 1): `0` renders a static scene.
//!
//! Example: `stub://front_camera?fps=15&frames=300`.

use anyhow::{anyhow, bail, Result};
use image::{Rgb, RgbImage};

use super::source::{FrameSource, SourceRead};
use crate::frame::Frame;

pub const STUB_SCHEME: &str = "stub://";

const BACKGROUND: Rgb<u8> = Rgb([48, 52, 60]);
const OBJECT: Rgb<u8> = Rgb([235, 235, 235]);
const OBJECT_STEP_PX: u32 = 8;

/// Parsed `stub://` identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub name: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frame_limit: Option<u64>,
    pub moving_object: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            fps: 10.0,
            width: 640,
            height: 480,
            frame_limit: None,
            moving_object: true,
        }
    }
}

impl SyntheticConfig {
    pub fn parse(identifier: &str) -> Result<Self> {
        let rest = identifier
            .strip_prefix(STUB_SCHEME)
            .ok_or_else(|| anyhow!("synthetic identifiers must start with {}", STUB_SCHEME))?;
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, query),
            None => (rest, ""),
        };

        let mut cfg = Self {
            name: if name.is_empty() {
                "synthetic".to_string()
            } else {
                name.to_string()
            },
            ..Self::default()
        };

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed query parameter '{}' in {}", pair, identifier))?;
            match key {
                "fps" => cfg.fps = parse_value(key, value)?,
                "width" => cfg.width = parse_value(key, value)?,
                "height" => cfg.height = parse_value(key, value)?,
                "frames" => cfg.frame_limit = Some(parse_value(key, value)?),
                "object" => cfg.moving_object = parse_value::<u8>(key, value)? != 0,
                other => bail!("unknown synthetic source parameter '{}'", other),
            }
        }

        if cfg.width == 0 || cfg.height == 0 {
            bail!("synthetic frame size must be non-zero");
        }
        Ok(cfg)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid value '{}' for synthetic parameter '{}'", value, key))
}

/// Camera-free frame source for tests and demos.
#[derive(Default)]
pub struct SyntheticSource {
    config: Option<SyntheticConfig>,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames produced since the last `open`.
    pub fn frames_generated(&self) -> u64 {
        self.frame_count
    }

    fn render(config: &SyntheticConfig, frame_index: u64) -> RgbImage {
        let mut image = RgbImage::from_pixel(config.width, config.height, BACKGROUND);
        if !config.moving_object {
            return image;
        }

        let side = (config.width.min(config.height) / 6).max(1);
        let travel = config.width.saturating_sub(side).max(1) as u64;
        let x0 = ((frame_index * OBJECT_STEP_PX as u64) % travel) as u32;
        let y0 = (config.height - side) / 2;
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                image.put_pixel(x, y, OBJECT);
            }
        }
        image
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(&mut self, identifier: &str) -> Result<()> {
        let config = SyntheticConfig::parse(identifier)?;
        log::info!(
            "SyntheticSource: opened {} ({}x{} @ {} fps)",
            config.name,
            config.width,
            config.height,
            config.fps
        );
        self.config = Some(config);
        self.frame_count = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<SourceRead> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| anyhow!("synthetic source is not open"))?;
        if config
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(SourceRead::Ended);
        }

        let image = Self::render(config, self.frame_count);
        self.frame_count += 1;
        Ok(SourceRead::Frame(Frame::new(image)))
    }

    fn frame_rate(&self) -> Option<f64> {
        self.config
            .as_ref()
            .map(|config| config.fps)
            .filter(|fps| *fps > 0.0)
    }

    fn close(&mut self) {
        if let Some(config) = self.config.take() {
            log::info!(
                "SyntheticSource: closed {} after {} frames",
                config.name,
                self.frame_count
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_parameters() -> Result<()> {
        let cfg = SyntheticConfig::parse("stub://porch?fps=15&width=320&height=240&frames=3")?;
        assert_eq!(cfg.name, "porch");
        assert_eq!(cfg.fps, 15.0);
        assert_eq!((cfg.width, cfg.height), (320, 240));
        assert_eq!(cfg.frame_limit, Some(3));
        assert!(cfg.moving_object);
        Ok(())
    }

    #[test]
    fn rejects_unknown_parameters_and_schemes() {
        assert!(SyntheticConfig::parse("stub://x?color=red").is_err());
        assert!(SyntheticConfig::parse("rtsp://camera").is_err());
        assert!(SyntheticConfig::parse("stub://x?width=0").is_err());
    }

    #[test]
    fn produces_frames_then_ends() -> Result<()> {
        let mut source = SyntheticSource::new();
        source.open("stub://test?width=64&height=48&frames=2")?;
        assert_eq!(source.frame_rate(), Some(10.0));

        for _ in 0..2 {
            match source.read()? {
                SourceRead::Frame(frame) => {
                    assert_eq!((frame.width(), frame.height()), (64, 48));
                }
                other => panic!("expected a frame, got {:?}", other),
            }
        }
        assert!(matches!(source.read()?, SourceRead::Ended));
        Ok(())
    }

    #[test]
    fn zero_fps_reports_no_frame_rate() -> Result<()> {
        let mut source = SyntheticSource::new();
        source.open("stub://test?fps=0")?;
        assert_eq!(source.frame_rate(), None);
        Ok(())
    }

    #[test]
    fn object_moves_between_frames() -> Result<()> {
        let mut source = SyntheticSource::new();
        source.open("stub://test?width=96&height=48")?;
        let SourceRead::Frame(first) = source.read()? else {
            panic!("expected frame");
        };
        let SourceRead::Frame(second) = source.read()? else {
            panic!("expected frame");
        };
        assert_ne!(first.pixels(), second.pixels());
        Ok(())
    }

    #[test]
    fn reopen_resets_counter() -> Result<()> {
        let mut source = SyntheticSource::new();
        source.open("stub://a?frames=1")?;
        source.read()?;
        source.close();
        source.close();
        assert!(source.read().is_err());

        source.open("stub://b?frames=1")?;
        assert_eq!(source.frames_generated(), 0);
        assert!(matches!(source.read()?, SourceRead::Frame(_)));
        Ok(())
    }
}
