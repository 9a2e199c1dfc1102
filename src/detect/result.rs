/// COCO class id for "person", the default class of interest.
pub const PERSON_CLASS_ID: u32 = 0;

/// Axis-aligned box in frame pixel coordinates (min inclusive, max exclusive).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Box from centre point and size, as emitted by YOLO-style heads.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x_max.min(other.x_max) - self.x_min.max(other.x_min)).max(0.0);
        let iy = (self.y_max.min(other.y_max) - self.y_min.max(other.y_min)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Integer pixel rectangle `(x, y, width, height)` clipped to a frame.
    ///
    /// `None` when nothing of the box lies inside the frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x_min.max(0.0).floor() as u32;
        let y0 = self.y_min.max(0.0).floor() as u32;
        let x1 = (self.x_max.min(frame_width as f32).ceil().max(0.0) as u32).min(frame_width);
        let y1 = (self.y_max.min(frame_height as f32).ceil().max(0.0) as u32).min(frame_height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// One detected object.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Greedy per-class non-maximum suppression.
///
/// Keeps the most confident detection of each overlapping cluster; boxes of
/// different classes never suppress each other.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|existing| {
            existing.class_id == candidate.class_id
                && existing.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_clips_to_frame() {
        let bbox = BoundingBox::new(-5.0, 10.0, 700.0, 20.5);
        assert_eq!(bbox.clamp_to(640, 480), Some((0, 10, 640, 11)));
        let outside = BoundingBox::new(700.0, 10.0, 800.0, 20.0);
        assert_eq!(outside.clamp_to(640, 480), None);
    }

    #[test]
    fn from_center_builds_corners() {
        let bbox = BoundingBox::from_center(50.0, 40.0, 20.0, 10.0);
        assert_eq!(bbox, BoundingBox::new(40.0, 35.0, 60.0, 45.0));
    }

    #[test]
    fn nms_keeps_best_of_each_cluster() {
        let det = |class_id, x: f32, confidence| Detection {
            class_id,
            bbox: BoundingBox::new(x, 0.0, x + 10.0, 10.0),
            confidence,
        };
        let kept = non_max_suppression(
            vec![
                det(0, 0.0, 0.6),
                det(0, 1.0, 0.9),
                det(2, 1.0, 0.5),
                det(0, 50.0, 0.4),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0], det(0, 1.0, 0.9));
        assert!(kept.contains(&det(2, 1.0, 0.5)));
        assert!(kept.contains(&det(0, 50.0, 0.4)));
    }
}
