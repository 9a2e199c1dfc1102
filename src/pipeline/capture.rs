//! Producer loop: source -> fit -> queue, paced to the source frame rate.

use std::time::Duration;

use crate::ingest::SourceRead;

use super::engine::{Captured, Shared, SourceTick};
use super::timer::PacingTimer;

/// Back-off when the gate is open but no source is installed.
///
/// Transient: every teardown closes the capture gate before it empties the
/// slot, and only `set_video_source` reopens it once a source is in place. A
/// loop that passed the gate just before a teardown backs off once, then
/// blocks on the closed gate.
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

pub(crate) fn run(shared: &Shared) {
    log::debug!("capture loop started");
    let mut sequence: u64 = 0;

    loop {
        if !shared.capture_gate.wait_open() {
            break;
        }

        let timer = PacingTimer::start();
        let Some(SourceTick {
            read,
            generation,
            interval,
        }) = shared.read_source()
        else {
            if !shared.capture_gate.sleep(IDLE_BACKOFF) {
                break;
            }
            continue;
        };

        match read {
            Ok(SourceRead::Frame(frame)) if !frame.is_empty() => {
                let mut frame = frame.fit_within(&shared.window());
                sequence += 1;
                frame.set_sequence(sequence);
                if shared.is_current(generation) {
                    log::trace!(
                        "captured frame {} ({}x{})",
                        sequence,
                        frame.width(),
                        frame.height()
                    );
                    if shared.queue.push(Captured { frame, generation }).is_err() {
                        break;
                    }
                    shared.stats.captured();
                }
            }
            // Transient miss: nothing to push this tick.
            Ok(SourceRead::Frame(_)) | Ok(SourceRead::Empty) => {}
            Ok(SourceRead::Ended) => {
                log::info!("video source reached end of stream");
                shared.source_lost(generation);
                continue;
            }
            Err(err) => {
                log::warn!("video source read failed: {:#}", err);
                shared.source_lost(generation);
                continue;
            }
        }

        if let Some(left) = interval.and_then(|interval| timer.remaining(interval)) {
            if !shared.capture_gate.sleep(left) {
                break;
            }
        }
    }

    log::debug!("capture loop stopped");
}
