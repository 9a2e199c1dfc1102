use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use presence_pipeline::config::PresenceConfig;
use presence_pipeline::WindowDimensions;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PRESENCE_CONFIG",
        "PRESENCE_SOURCE",
        "PRESENCE_QUEUE_CAPACITY",
        "PRESENCE_MAX_WIDTH",
        "PRESENCE_MAX_HEIGHT",
        "PRESENCE_CLASSES",
        "PRESENCE_DETECTOR",
        "PRESENCE_MODEL_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PresenceConfig::load().expect("load config");
    assert_eq!(cfg.source, "stub://front_camera");
    assert_eq!(cfg.queue_capacity, 1);
    assert_eq!(cfg.window, WindowDimensions::new(1920, 1080, 960, 540));
    assert_eq!(cfg.classes_of_interest, vec![0]);
    assert_eq!(cfg.detector.backend, "motion");
    assert_eq!(cfg.notify_cooldown, Duration::ZERO);
    assert_eq!(cfg.display.poll_interval, Duration::from_millis(33));
    assert!(cfg.display.snapshot_path.is_none());
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": "/dev/video2",
        "queue_capacity": 2,
        "window": {
            "max_width": 1280,
            "max_height": 720,
            "min_width": 320,
            "min_height": 180
        },
        "detector": {
            "backend": "motion",
            "confidence_threshold": 0.4
        },
        "classes_of_interest": [0, 16],
        "notify": { "cooldown_ms": 2000 },
        "display": { "poll_ms": 50, "snapshot_path": "/tmp/latest.jpg" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PRESENCE_CONFIG", file.path());
    std::env::set_var("PRESENCE_SOURCE", "stub://porch?fps=5");
    std::env::set_var("PRESENCE_CLASSES", "0, 2");

    let cfg = PresenceConfig::load().expect("load config");
    assert_eq!(cfg.source, "stub://porch?fps=5");
    assert_eq!(cfg.queue_capacity, 2);
    assert_eq!(cfg.window, WindowDimensions::new(1280, 720, 320, 180));
    assert_eq!(cfg.detector.confidence_threshold, 0.4);
    assert_eq!(cfg.classes_of_interest, vec![0, 2]);
    assert_eq!(cfg.notify_cooldown, Duration::from_secs(2));
    assert_eq!(cfg.display.poll_interval, Duration::from_millis(50));
    assert_eq!(
        cfg.display.snapshot_path.as_deref(),
        Some(std::path::Path::new("/tmp/latest.jpg"))
    );

    let options = cfg.engine_options();
    assert_eq!(options.queue_capacity, 2);
    assert_eq!(options.annotator.classes_of_interest(), &[0, 2]);

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
source = "stub://yard"
classes_of_interest = [0]

[window]
max_width = 640
max_height = 480
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = PresenceConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.source, "stub://yard");
    assert_eq!(cfg.window, WindowDimensions::new(640, 480, 320, 240));
}

#[test]
fn env_max_dimensions_reset_minimum() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PRESENCE_MAX_WIDTH", "800");
    std::env::set_var("PRESENCE_MAX_HEIGHT", "600");
    let cfg = PresenceConfig::load().expect("load config");
    assert_eq!(cfg.window, WindowDimensions::new(800, 600, 400, 300));

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PRESENCE_QUEUE_CAPACITY", "0");
    assert!(PresenceConfig::load().is_err());
    std::env::set_var("PRESENCE_QUEUE_CAPACITY", "many");
    assert!(PresenceConfig::load().is_err());
    clear_env();

    std::env::set_var("PRESENCE_CLASSES", "person");
    assert!(PresenceConfig::load().is_err());
    clear_env();

    std::env::set_var("PRESENCE_DETECTOR", "radar");
    assert!(PresenceConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    assert!(PresenceConfig::load_from(Some(file.path())).is_err());

    clear_env();
}
