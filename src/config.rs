use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::annotate::Annotator;
use crate::detect::PERSON_CLASS_ID;
use crate::frame::{WindowDimensions, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH};
use crate::pipeline::{EngineOptions, DEFAULT_QUEUE_CAPACITY};

const DEFAULT_SOURCE: &str = "stub://front_camera";
const DEFAULT_DETECTOR: &str = "motion";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_POLL_MS: u64 = 33;

/// Detector backends `PresenceConfig` accepts.
pub const KNOWN_DETECTORS: &[&str] = &["motion", "tract"];

#[derive(Debug, Deserialize, Default)]
struct PresenceConfigFile {
    source: Option<String>,
    queue_capacity: Option<usize>,
    window: Option<WindowConfigFile>,
    detector: Option<DetectorConfigFile>,
    classes_of_interest: Option<Vec<u32>>,
    notify: Option<NotifyConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct WindowConfigFile {
    max_width: Option<u32>,
    max_height: Option<u32>,
    min_width: Option<u32>,
    min_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct NotifyConfigFile {
    cooldown_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    poll_ms: Option<u64>,
    snapshot_path: Option<PathBuf>,
}

/// Daemon configuration: optional file named by `PRESENCE_CONFIG`, then
/// `PRESENCE_*` environment overrides.
///
/// Overriding a maximum window dimension from the environment resets the
/// matching minimum to half of it.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    pub source: String,
    pub queue_capacity: usize,
    pub window: WindowDimensions,
    pub detector: DetectorSettings,
    pub classes_of_interest: Vec<u32>,
    pub notify_cooldown: Duration,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub poll_interval: Duration,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self::from_file(PresenceConfigFile::default())
    }
}

impl PresenceConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PRESENCE_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like [`load`](Self::load), but with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => PresenceConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            queue_capacity: self.queue_capacity,
            window: self.window,
            annotator: Annotator::new(self.classes_of_interest.clone()),
        }
    }

    fn from_file(file: PresenceConfigFile) -> Self {
        let source = file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let queue_capacity = file.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);

        let window_file = file.window.unwrap_or_default();
        let max_width = window_file.max_width.unwrap_or(DEFAULT_MAX_WIDTH);
        let max_height = window_file.max_height.unwrap_or(DEFAULT_MAX_HEIGHT);
        let defaults = WindowDimensions::with_max(max_width, max_height);
        let window = WindowDimensions::new(
            max_width,
            max_height,
            window_file.min_width.unwrap_or(defaults.min_width),
            window_file.min_height.unwrap_or(defaults.min_height),
        );

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
            model_path: detector_file.model_path,
            input_width: detector_file.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: detector_file.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE),
        };

        let classes_of_interest = file
            .classes_of_interest
            .unwrap_or_else(|| vec![PERSON_CLASS_ID]);
        let notify_cooldown = Duration::from_millis(
            file.notify
                .and_then(|notify| notify.cooldown_ms)
                .unwrap_or(0),
        );

        let display_file = file.display.unwrap_or_default();
        let display = DisplaySettings {
            poll_interval: Duration::from_millis(display_file.poll_ms.unwrap_or(DEFAULT_POLL_MS)),
            snapshot_path: display_file.snapshot_path,
        };

        Self {
            source,
            queue_capacity,
            window,
            detector,
            classes_of_interest,
            notify_cooldown,
            display,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("PRESENCE_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source;
            }
        }
        if let Ok(capacity) = std::env::var("PRESENCE_QUEUE_CAPACITY") {
            self.queue_capacity = capacity
                .trim()
                .parse()
                .map_err(|_| anyhow!("PRESENCE_QUEUE_CAPACITY must be a positive integer"))?;
        }
        if let Ok(width) = std::env::var("PRESENCE_MAX_WIDTH") {
            self.window.max_width = width
                .trim()
                .parse()
                .map_err(|_| anyhow!("PRESENCE_MAX_WIDTH must be an integer number of pixels"))?;
            self.window.min_width = self.window.max_width / 2;
        }
        if let Ok(height) = std::env::var("PRESENCE_MAX_HEIGHT") {
            self.window.max_height = height
                .trim()
                .parse()
                .map_err(|_| anyhow!("PRESENCE_MAX_HEIGHT must be an integer number of pixels"))?;
            self.window.min_height = self.window.max_height / 2;
        }
        if let Ok(classes) = std::env::var("PRESENCE_CLASSES") {
            let parsed = split_csv(&classes)
                .iter()
                .map(|entry| {
                    entry
                        .parse::<u32>()
                        .map_err(|_| anyhow!("PRESENCE_CLASSES entry '{}' is not a class id", entry))
                })
                .collect::<Result<Vec<_>>>()?;
            if !parsed.is_empty() {
                self.classes_of_interest = parsed;
            }
        }
        if let Ok(backend) = std::env::var("PRESENCE_DETECTOR") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("PRESENCE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        if self.queue_capacity == 0 {
            return Err(anyhow!("queue_capacity must be at least 1"));
        }
        let window = &self.window;
        if window.max_width == 0 || window.max_height == 0 {
            return Err(anyhow!("window maximum dimensions must be greater than zero"));
        }
        if window.min_width > window.max_width || window.min_height > window.max_height {
            return Err(anyhow!(
                "window minimum {}x{} exceeds maximum {}x{}",
                window.min_width,
                window.min_height,
                window.max_width,
                window.max_height
            ));
        }
        if self.classes_of_interest.is_empty() {
            return Err(anyhow!("classes_of_interest must list at least one class id"));
        }
        if !KNOWN_DETECTORS.contains(&self.detector.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of: {})",
                self.detector.backend,
                KNOWN_DETECTORS.join(", ")
            ));
        }
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("the tract detector requires detector.model_path"));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(anyhow!("detector.confidence_threshold must be within 0..=1"));
        }
        if self.display.poll_interval.is_zero() {
            return Err(anyhow!("display.poll_ms must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PresenceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() -> Result<()> {
        let mut cfg = PresenceConfig::default();
        cfg.validate()?;
        assert_eq!(cfg.source, DEFAULT_SOURCE);
        assert_eq!(cfg.queue_capacity, 1);
        assert_eq!(cfg.window, WindowDimensions::with_max(1920, 1080));
        assert_eq!(cfg.classes_of_interest, vec![0]);
        assert_eq!(cfg.detector.backend, "motion");
        assert_eq!(cfg.display.poll_interval, Duration::from_millis(33));
        Ok(())
    }

    #[test]
    fn missing_min_follows_max() -> Result<()> {
        let file: PresenceConfigFile =
            serde_json::from_str(r#"{"window": {"max_width": 800, "max_height": 600}}"#)?;
        let cfg = PresenceConfig::from_file(file);
        assert_eq!(cfg.window, WindowDimensions::new(800, 600, 400, 300));
        Ok(())
    }

    #[test]
    fn rejects_min_above_max() -> Result<()> {
        let file: PresenceConfigFile = serde_json::from_str(
            r#"{"window": {"max_width": 800, "max_height": 600, "min_width": 900}}"#,
        )?;
        let mut cfg = PresenceConfig::from_file(file);
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn rejects_unknown_detector_and_tract_without_model() -> Result<()> {
        let mut cfg = PresenceConfig::default();
        cfg.detector.backend = "yolo9000".to_string();
        assert!(cfg.validate().is_err());

        cfg.detector.backend = "tract".to_string();
        assert!(cfg.validate().is_err());
        cfg.detector.model_path = Some(PathBuf::from("model.onnx"));
        cfg.validate()?;
        Ok(())
    }

    #[test]
    fn split_csv_skips_blanks() {
        assert_eq!(split_csv(" 0, ,2,"), vec!["0".to_string(), "2".to_string()]);
    }
}
