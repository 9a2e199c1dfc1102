//! presenced - presence detection daemon
//!
//! This daemon:
//! 1. Loads configuration (optional file, then PRESENCE_* environment)
//! 2. Starts the capture/process pipeline on the configured source
//! 3. Polls the newest annotated frame the way a display would, optionally
//!    writing it to a JPEG snapshot
//! 4. Logs a health line every few seconds
//! 5. Shuts the pipeline down on Ctrl-C or after --seconds

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use presence_pipeline::detect::{build_detector, PERSON_CLASS_ID};
use presence_pipeline::{
    CooldownNotifier, DeviceSource, Frame, LogNotifier, PipelineEngine, PresenceConfig,
};

const HEALTH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the presence detection pipeline")]
struct Args {
    /// Config file (JSON, or TOML when the extension is .toml).
    #[arg(long, env = "PRESENCE_CONFIG")]
    config: Option<PathBuf>,

    /// Video source identifier (stub://name, /dev/videoN, file path or URL).
    #[arg(long)]
    source: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    seconds: Option<u64>,

    /// Write the newest annotated frame to this JPEG file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Display poll interval in milliseconds.
    #[arg(long)]
    poll_ms: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = PresenceConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.source = source;
    }
    if let Some(poll_ms) = args.poll_ms {
        if poll_ms == 0 {
            return Err(anyhow!("--poll-ms must be greater than zero"));
        }
        cfg.display.poll_interval = Duration::from_millis(poll_ms);
    }
    let snapshot_path = args.snapshot.or_else(|| cfg.display.snapshot_path.clone());

    let motion_class = cfg
        .classes_of_interest
        .first()
        .copied()
        .unwrap_or(PERSON_CLASS_ID);
    let detector = build_detector(&cfg.detector, motion_class)?;
    let notifier = CooldownNotifier::new(LogNotifier::new(), cfg.notify_cooldown);

    let options = cfg.engine_options();
    log::info!(
        "presenced {} starting (source {}, detector {}, classes {:?})",
        env!("CARGO_PKG_VERSION"),
        cfg.source,
        cfg.detector.backend,
        options.annotator.classes_of_interest()
    );
    let engine = PipelineEngine::start(
        Box::new(DeviceSource::new()),
        detector,
        Box::new(notifier),
        options,
    )?;

    if let Err(err) = engine.set_video_source(&cfg.source) {
        engine.shutdown()?;
        return Err(err).context("failed to start video source");
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    let deadline = args
        .seconds
        .map(|seconds| Instant::now() + Duration::from_secs(seconds));
    let mut last_health = Instant::now();
    let mut displayed: u64 = 0;
    let mut last_latency: Option<Duration> = None;

    log::info!("presenced running, waiting for shutdown signal (Ctrl-C)...");
    loop {
        match rx.recv_timeout(cfg.display.poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                log::info!("shutdown signal received");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let latest = engine.get_latest_frame();
        if let Some(frame) = latest.frame {
            displayed += 1;
            last_latency = Some(frame.age());
            if let Some(path) = &snapshot_path {
                if let Err(err) = write_snapshot(path, frame) {
                    log::warn!("snapshot write failed: {:#}", err);
                }
            }
        }

        if last_health.elapsed() >= HEALTH_INTERVAL {
            let state = engine.state();
            if !state.has_source() {
                log::warn!("no video source active ({:?})", state);
            }
            let stats = engine.stats();
            log::info!(
                "health: state={:?} source_live={} displayed={} latency_ms={:?} captured={} processed={} published={} overwritten={} notifications={} teardowns={}",
                state,
                latest.source_live,
                displayed,
                last_latency.map(|latency| latency.as_millis()),
                stats.frames_captured,
                stats.frames_processed,
                stats.frames_published,
                stats.frames_overwritten,
                stats.notifications,
                stats.source_teardowns
            );
            last_health = Instant::now();
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            log::info!("run time elapsed");
            break;
        }
    }

    engine.shutdown()?;
    log::info!("presenced stopped after displaying {} frame(s)", displayed);
    Ok(())
}

/// Write `frame` as JPEG next to `path`, then move it into place.
fn write_snapshot(path: &Path, frame: Frame) -> Result<()> {
    let partial = path.with_extension("partial");
    frame
        .into_image()
        .save_with_format(&partial, image::ImageFormat::Jpeg)
        .with_context(|| format!("encode snapshot {}", partial.display()))?;
    std::fs::rename(&partial, path)
        .with_context(|| format!("move snapshot into {}", path.display()))?;
    Ok(())
}
