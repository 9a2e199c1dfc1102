use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection, PERSON_CLASS_ID};
use crate::frame::Frame;

/// Tuning for [`MotionDetector`].
#[derive(Clone, Debug)]
pub struct MotionConfig {
    /// Per-channel difference above which a pixel counts as changed.
    pub pixel_threshold: u8,
    /// Changed pixels needed before a detection is reported.
    pub min_changed_pixels: usize,
    /// Class id attached to motion detections.
    pub class_id: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: 32,
            min_changed_pixels: 16,
            class_id: PERSON_CLASS_ID,
        }
    }
}

struct Reference {
    hash: [u8; 32],
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Frame-differencing detector.
///
/// Reports the bounding box of every pixel that changed since the previous
/// frame as one detection. Identical frames are short-circuited by hash.
#[derive(Default)]
pub struct MotionDetector {
    config: MotionConfig,
    reference: Option<Reference>,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            reference: None,
        }
    }

    fn changed_region(&self, reference: &Reference, frame: &Frame) -> Option<Detection> {
        let threshold = self.config.pixel_threshold;
        let width = frame.width() as usize;
        let (mut x_min, mut y_min) = (usize::MAX, usize::MAX);
        let (mut x_max, mut y_max) = (0usize, 0usize);
        let mut changed = 0usize;

        let current = frame.pixels().chunks_exact(3);
        let previous = reference.pixels.chunks_exact(3);
        for (index, (now, before)) in current.zip(previous).enumerate() {
            let moved = now
                .iter()
                .zip(before)
                .any(|(a, b)| a.abs_diff(*b) > threshold);
            if !moved {
                continue;
            }
            let (x, y) = (index % width, index / width);
            changed += 1;
            x_min = x_min.min(x);
            y_min = y_min.min(y);
            x_max = x_max.max(x);
            y_max = y_max.max(y);
        }

        if changed == 0 || changed < self.config.min_changed_pixels {
            return None;
        }

        let bbox = BoundingBox::new(
            x_min as f32,
            y_min as f32,
            (x_max + 1) as f32,
            (y_max + 1) as f32,
        );
        let confidence = (changed as f32 / bbox.area().max(1.0)).min(1.0);
        Some(Detection {
            class_id: self.config.class_id,
            bbox,
            confidence,
        })
    }
}

impl Detector for MotionDetector {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let hash: [u8; 32] = Sha256::digest(frame.pixels()).into();

        let detection = match &self.reference {
            Some(reference) if reference.hash == hash => return Ok(Vec::new()),
            Some(reference)
                if reference.width == frame.width() && reference.height == frame.height() =>
            {
                self.changed_region(reference, frame)
            }
            // First frame, or the stream changed size.
            _ => None,
        };

        self.reference = Some(Reference {
            hash,
            width: frame.width(),
            height: frame.height(),
            pixels: frame.pixels().to_vec(),
        });
        Ok(detection.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn scene(square_at: Option<(u32, u32)>) -> Frame {
        let mut image = RgbImage::from_pixel(64, 48, Rgb([10, 10, 10]));
        if let Some((x0, y0)) = square_at {
            for y in y0..y0 + 8 {
                for x in x0..x0 + 8 {
                    image.put_pixel(x, y, Rgb([250, 250, 250]));
                }
            }
        }
        Frame::new(image)
    }

    #[test]
    fn first_frame_never_reports_motion() -> Result<()> {
        let mut detector = MotionDetector::default();
        assert!(detector.detect(&scene(Some((4, 4))))?.is_empty());
        Ok(())
    }

    #[test]
    fn identical_frames_report_nothing() -> Result<()> {
        let mut detector = MotionDetector::default();
        detector.detect(&scene(None))?;
        assert!(detector.detect(&scene(None))?.is_empty());
        Ok(())
    }

    #[test]
    fn reports_bounding_box_of_change() -> Result<()> {
        let mut detector = MotionDetector::default();
        detector.detect(&scene(None))?;
        let detections = detector.detect(&scene(Some((10, 20))))?;
        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert_eq!(detection.class_id, PERSON_CLASS_ID);
        assert_eq!(detection.bbox, BoundingBox::new(10.0, 20.0, 18.0, 28.0));
        assert!((detection.confidence - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn small_changes_stay_below_minimum() -> Result<()> {
        let mut detector = MotionDetector::new(MotionConfig {
            min_changed_pixels: 100,
            ..MotionConfig::default()
        });
        detector.detect(&scene(None))?;
        assert!(detector.detect(&scene(Some((0, 0))))?.is_empty());
        Ok(())
    }

    #[test]
    fn size_change_resets_reference() -> Result<()> {
        let mut detector = MotionDetector::default();
        detector.detect(&scene(None))?;
        let bigger = Frame::new(RgbImage::from_pixel(80, 60, Rgb([200, 0, 0])));
        assert!(detector.detect(&bigger)?.is_empty());
        Ok(())
    }
}
