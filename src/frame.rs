//! Frame container and display fitting.
//!
//! - `Frame`: owned RGB pixel buffer that moves through the pipeline. Not
//!   `Clone`: a frame is owned by exactly one stage at a time.
//! - `WindowDimensions`: the display budget the capture loop fits frames into.
//! - `fit_dimensions`: pure aspect-preserving fit used before enqueueing.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::RgbImage;
use std::fmt;
use std::time::{Duration, Instant};

/// Default maximum display width.
pub const DEFAULT_MAX_WIDTH: u32 = 1920;
/// Default maximum display height.
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// A single RGB frame.
///
/// Produced by a `FrameSource`, resized by the capture loop, annotated by the
/// process loop and finally handed to the display layer.
pub struct Frame {
    image: RgbImage,
    /// Capture order assigned by the capture loop (0 until enqueued).
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    /// Build a frame from tightly packed RGB24 bytes.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", width, height))?;
        Ok(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A frame with no pixels. Sources may hand these out on a transient miss.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// Time since the source produced this frame.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Packed RGB24 pixel bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Resize so the frame fits the display window, preserving aspect ratio.
    ///
    /// Returns the frame untouched when the fitted size equals the current size.
    pub fn fit_within(self, window: &WindowDimensions) -> Frame {
        let (width, height) = fit_dimensions(self.width(), self.height(), window);
        if width == self.width() && height == self.height() {
            return self;
        }
        let image = image::imageops::resize(&self.image, width, height, FilterType::Triangle);
        Frame {
            image,
            sequence: self.sequence,
            captured_at: self.captured_at,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Pixel data is never formatted.
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Display fitting
// ----------------------------------------------------------------------------

/// Display budget used by the capture loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowDimensions {
    pub max_width: u32,
    pub max_height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl WindowDimensions {
    pub fn new(max_width: u32, max_height: u32, min_width: u32, min_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            min_width,
            min_height,
        }
    }

    /// Maximum box only; the minimum box defaults to half of it.
    pub fn with_max(max_width: u32, max_height: u32) -> Self {
        Self::new(max_width, max_height, max_width / 2, max_height / 2)
    }
}

impl Default for WindowDimensions {
    fn default() -> Self {
        Self::with_max(DEFAULT_MAX_WIDTH, DEFAULT_MAX_HEIGHT)
    }
}

/// Output dimensions for a `width`x`height` frame shown inside `window`.
///
/// Frames larger than the maximum box scale down by `min(max_w/w, max_h/h)`;
/// anything that already fits comes back unchanged. The minimum box is never
/// consulted here, so small frames are not enlarged.
///
/// Scaled dimensions are truncated to whole pixels and never drop below 1.
pub fn fit_dimensions(width: u32, height: u32, window: &WindowDimensions) -> (u32, u32) {
    if width == 0 || height == 0 || window.max_width == 0 || window.max_height == 0 {
        return (width, height);
    }
    if width <= window.max_width && height <= window.max_height {
        return (width, height);
    }

    Ratio::smallest(&[
        Ratio::new(window.max_width, width),
        Ratio::new(window.max_height, height),
    ])
    .apply(width, height)
}

/// Exact scale factor `num / den`, kept rational so truncation matches the
/// real-valued result (0.48 * 4000 must be 1920, not 1919).
#[derive(Clone, Copy, Debug)]
struct Ratio {
    num: u64,
    den: u64,
}

impl Ratio {
    fn new(num: u32, den: u32) -> Self {
        Self {
            num: num as u64,
            den: den as u64,
        }
    }

    fn less_than(&self, other: &Ratio) -> bool {
        self.num * other.den < other.num * self.den
    }

    fn smallest(candidates: &[Ratio]) -> Ratio {
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.less_than(&best) {
                best = *candidate;
            }
        }
        best
    }

    fn apply(&self, width: u32, height: u32) -> (u32, u32) {
        let w = (width as u64 * self.num / self.den).max(1);
        let h = (height as u64 * self.num / self.den).max(1);
        (w as u32, h as u32)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_frame_scales_to_max_box() {
        let window = WindowDimensions::with_max(1920, 1080);
        assert_eq!(fit_dimensions(4000, 2000, &window), (1920, 960));
    }

    #[test]
    fn frame_inside_max_box_is_unchanged() {
        let window = WindowDimensions::with_max(1920, 1080);
        assert_eq!(fit_dimensions(800, 600, &window), (800, 600));
        assert_eq!(fit_dimensions(1920, 1080, &window), (1920, 1080));
    }

    #[test]
    fn tall_frame_is_bounded_by_height() {
        let window = WindowDimensions::with_max(1920, 1080);
        assert_eq!(fit_dimensions(1000, 2160, &window), (500, 1080));
    }

    #[test]
    fn small_frame_is_never_enlarged() {
        assert_eq!(
            fit_dimensions(640, 480, &WindowDimensions::default()),
            (640, 480)
        );
        let window = WindowDimensions::new(400, 300, 2000, 2000);
        assert_eq!(fit_dimensions(100, 100, &window), (100, 100));
    }

    #[test]
    fn fit_within_keeps_small_frame_untouched() -> Result<()> {
        let frame = Frame::from_rgb(64, 48, vec![3u8; 64 * 48 * 3])?;
        let fitted = frame.fit_within(&WindowDimensions::default());
        assert_eq!((fitted.width(), fitted.height()), (64, 48));
        Ok(())
    }

    #[test]
    fn fit_within_resizes_pixels() -> Result<()> {
        let frame = Frame::from_rgb(40, 20, vec![7u8; 40 * 20 * 3])?;
        let fitted = frame.fit_within(&WindowDimensions::new(20, 20, 0, 0));
        assert_eq!((fitted.width(), fitted.height()), (20, 10));
        assert_eq!(fitted.pixels().len(), 20 * 10 * 3);
        Ok(())
    }

    #[test]
    fn resize_keeps_capture_time() -> Result<()> {
        let frame = Frame::from_rgb(40, 20, vec![7u8; 40 * 20 * 3])?;
        std::thread::sleep(Duration::from_millis(20));
        let fitted = frame.fit_within(&WindowDimensions::new(20, 20, 0, 0));
        assert_eq!(fitted.width(), 20);
        assert!(fitted.age() >= Duration::from_millis(20));
        Ok(())
    }

    #[test]
    fn from_rgb_rejects_short_buffer() {
        assert!(Frame::from_rgb(4, 4, vec![0u8; 10]).is_err());
    }

    #[test]
    fn empty_frame_is_detected() {
        let frame = Frame::new(RgbImage::new(0, 0));
        assert!(frame.is_empty());
    }
}
