//! Consumer loop: queue -> detect -> annotate -> publish -> notify.

use crate::annotate::Annotator;
use crate::detect::Detector;
use crate::notify::Notifier;

use super::engine::{Captured, Shared};

pub(crate) fn run(
    shared: &Shared,
    mut detector: Box<dyn Detector>,
    annotator: Annotator,
    mut notifier: Box<dyn Notifier>,
) {
    log::debug!("process loop started ({} detector)", detector.name());
    if let Err(err) = detector.warm_up() {
        log::warn!("detector {} warm-up failed: {:#}", detector.name(), err);
    }

    loop {
        if !shared.process_gate.wait_open() {
            break;
        }
        let Ok(Captured {
            mut frame,
            generation,
        }) = shared.queue.pop()
        else {
            break;
        };

        if !shared.is_current(generation) {
            log::debug!("dropping frame {} from a retired source", frame.sequence());
            continue;
        }

        let detections = match detector.detect(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!(
                    "detector {} failed on frame {}: {:#}",
                    detector.name(),
                    frame.sequence(),
                    err
                );
                continue;
            }
        };
        shared.stats.processed();

        let present = annotator.annotate(&mut frame, &detections);
        log::trace!(
            "frame {}: {} detection(s), of interest: {}",
            frame.sequence(),
            detections.len(),
            present
        );
        if !shared.publish(frame, generation) {
            log::debug!("discarding frame from a source retired during detection");
            continue;
        }

        if present {
            notifier.notify();
            shared.stats.notified();
        }
    }

    log::debug!("process loop stopped");
}
