pub mod motion;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use motion::{MotionConfig, MotionDetector};

#[cfg(feature = "backend-tract")]
pub use tract::TractDetector;
