use std::time::{Duration, Instant};

/// Wall-clock timer for one loop iteration.
#[derive(Clone, Copy, Debug)]
pub struct PacingTimer {
    started: Instant,
}

impl PacingTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left until `interval` has passed since `start()`.
    ///
    /// `None` once the iteration already took `interval` or longer; the caller
    /// then proceeds without sleeping.
    pub fn remaining(&self, interval: Duration) -> Option<Duration> {
        interval
            .checked_sub(self.elapsed())
            .filter(|left| !left.is_zero())
    }
}

/// Frame interval for a source reporting `fps` frames per second.
///
/// `None` for rates that cannot pace anything (zero, negative, NaN, infinite).
pub fn frame_interval(fps: f64) -> Option<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / fps).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn remaining_shrinks_with_elapsed_time() {
        let timer = PacingTimer::start();
        thread::sleep(Duration::from_millis(20));
        let left = timer.remaining(Duration::from_millis(100)).unwrap();
        assert!(left <= Duration::from_millis(80));
        assert!(timer.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn overrun_iteration_needs_no_sleep() {
        let timer = PacingTimer::start();
        thread::sleep(Duration::from_millis(15));
        assert!(timer.remaining(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn frame_interval_rejects_unusable_rates() {
        assert_eq!(frame_interval(10.0), Some(Duration::from_millis(100)));
        assert_eq!(frame_interval(0.0), None);
        assert_eq!(frame_interval(-5.0), None);
        assert_eq!(frame_interval(f64::NAN), None);
        assert_eq!(frame_interval(f64::INFINITY), None);
    }
}
