//! Box drawing for detections of interest.

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::{Detection, PERSON_CLASS_ID};
use crate::frame::Frame;

pub const DEFAULT_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const DEFAULT_BOX_THICKNESS: u32 = 2;

/// Draws a hollow box around each detection whose class is of interest.
#[derive(Clone, Debug)]
pub struct Annotator {
    classes_of_interest: Vec<u32>,
    color: Rgb<u8>,
    thickness: u32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(vec![PERSON_CLASS_ID])
    }
}

impl Annotator {
    pub fn new(classes_of_interest: Vec<u32>) -> Self {
        Self {
            classes_of_interest,
            color: DEFAULT_BOX_COLOR,
            thickness: DEFAULT_BOX_THICKNESS,
        }
    }

    pub fn with_style(mut self, color: Rgb<u8>, thickness: u32) -> Self {
        self.color = color;
        self.thickness = thickness.max(1);
        self
    }

    pub fn classes_of_interest(&self) -> &[u32] {
        &self.classes_of_interest
    }

    pub fn is_of_interest(&self, detection: &Detection) -> bool {
        self.classes_of_interest.contains(&detection.class_id)
    }

    /// Draw every detection of interest onto `frame`.
    ///
    /// Returns whether any detection was of interest, including ones that
    /// fall entirely outside the frame and therefore draw nothing.
    pub fn annotate(&self, frame: &mut Frame, detections: &[Detection]) -> bool {
        let (width, height) = (frame.width(), frame.height());
        let mut present = false;
        for detection in detections.iter().filter(|d| self.is_of_interest(d)) {
            present = true;
            if let Some(rect) = detection.bbox.clamp_to(width, height) {
                self.draw(frame, rect);
            }
        }
        present
    }

    fn draw(&self, frame: &mut Frame, (x, y, w, h): (u32, u32, u32, u32)) {
        // Nested outlines, growing inward.
        for inset in 0..self.thickness {
            let (Some(w), Some(h)) = (
                w.checked_sub(2 * inset).filter(|w| *w > 0),
                h.checked_sub(2 * inset).filter(|h| *h > 0),
            ) else {
                break;
            };
            let rect = Rect::at((x + inset) as i32, (y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(frame.image_mut(), rect, self.color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use image::RgbImage;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn blank() -> Frame {
        Frame::new(RgbImage::from_pixel(40, 30, BLACK))
    }

    fn person_at(x: f32, y: f32) -> Detection {
        Detection {
            class_id: PERSON_CLASS_ID,
            bbox: BoundingBox::new(x, y, x + 10.0, y + 10.0),
            confidence: 0.9,
        }
    }

    #[test]
    fn draws_two_pixel_green_outline() {
        let mut frame = blank();
        assert!(Annotator::default().annotate(&mut frame, &[person_at(5.0, 5.0)]));

        let image = frame.image();
        assert_eq!(*image.get_pixel(5, 5), DEFAULT_BOX_COLOR);
        assert_eq!(*image.get_pixel(6, 6), DEFAULT_BOX_COLOR);
        assert_eq!(*image.get_pixel(14, 14), DEFAULT_BOX_COLOR);
        assert_eq!(*image.get_pixel(7, 7), BLACK);
        assert_eq!(*image.get_pixel(10, 10), BLACK);
    }

    #[test]
    fn ignores_other_classes() {
        let mut frame = blank();
        let car = Detection {
            class_id: 2,
            ..person_at(5.0, 5.0)
        };
        assert!(!Annotator::default().annotate(&mut frame, &[car]));
        assert!(frame.image().pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn off_frame_detection_still_counts() {
        let mut frame = blank();
        assert!(Annotator::default().annotate(&mut frame, &[person_at(100.0, 100.0)]));
        assert!(frame.image().pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn thin_boxes_do_not_panic() {
        let mut frame = blank();
        let sliver = Detection {
            bbox: BoundingBox::new(3.0, 3.0, 4.0, 20.0),
            ..person_at(0.0, 0.0)
        };
        let annotator = Annotator::new(vec![0]).with_style(Rgb([255, 0, 0]), 5);
        assert!(annotator.annotate(&mut frame, &[sliver]));
        assert_eq!(*frame.image().get_pixel(3, 10), Rgb([255, 0, 0]));
    }
}
