//! Object detectors run by the process loop.

mod backend;
mod backends;
mod result;

use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;

pub use backend::Detector;
pub use backends::{MotionConfig, MotionDetector};
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use result::{non_max_suppression, BoundingBox, Detection, PERSON_CLASS_ID};

/// Build the detector named by `settings.backend`.
///
/// `motion_class` is the class id motion detections are labelled with.
pub fn build_detector(settings: &DetectorSettings, motion_class: u32) -> Result<Box<dyn Detector>> {
    match settings.backend.as_str() {
        "motion" => Ok(Box::new(MotionDetector::new(MotionConfig {
            class_id: motion_class,
            ..MotionConfig::default()
        }))),
        "tract" => build_tract(settings),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &DetectorSettings) -> Result<Box<dyn Detector>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("the tract detector requires a model path"))?;
    let detector = TractDetector::new(model_path, settings.input_width, settings.input_height)?
        .with_threshold(settings.confidence_threshold);
    Ok(Box::new(detector))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_settings: &DetectorSettings) -> Result<Box<dyn Detector>> {
    Err(anyhow!("the tract detector requires the backend-tract feature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresenceConfig;

    #[test]
    fn builds_motion_detector_by_default() -> Result<()> {
        let cfg = PresenceConfig::default();
        let detector = build_detector(&cfg.detector, 0)?;
        assert_eq!(detector.name(), "motion");
        Ok(())
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let mut cfg = PresenceConfig::default();
        cfg.detector.backend = "lidar".to_string();
        assert!(build_detector(&cfg.detector, 0).is_err());
    }
}
