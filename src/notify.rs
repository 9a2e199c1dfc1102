//! Presence notifications.
//!
//! The process loop calls `notify()` once for every frame that contains a
//! class of interest. Rate limiting is up to the notifier.

use std::time::{Duration, Instant};

/// Receives one call per frame of interest, on the process thread.
pub trait Notifier: Send {
    fn notify(&mut self);
}

impl<F: FnMut() + Send> Notifier for F {
    fn notify(&mut self) {
        self()
    }
}

/// Logs each notification at `info`.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: u64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self) {
        self.sent += 1;
        log::info!("presence detected (notification {})", self.sent);
    }
}

/// Forwards to `inner` at most once per `cooldown`.
pub struct CooldownNotifier<N> {
    inner: N,
    cooldown: Duration,
    last_sent: Option<Instant>,
    suppressed: u64,
}

impl<N: Notifier> CooldownNotifier<N> {
    pub fn new(inner: N, cooldown: Duration) -> Self {
        Self {
            inner,
            cooldown,
            last_sent: None,
            suppressed: 0,
        }
    }

    /// Notifications swallowed inside the cooldown window.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn into_inner(self) -> N {
        self.inner
    }
}

impl<N: Notifier> Notifier for CooldownNotifier<N> {
    fn notify(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_sent {
            if now.duration_since(last) < self.cooldown {
                self.suppressed += 1;
                return;
            }
        }
        self.last_sent = Some(now);
        self.inner.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_notifiers() {
        let mut count = 0;
        {
            let mut notifier = || count += 1;
            notifier.notify();
            notifier.notify();
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn zero_cooldown_forwards_everything() {
        let mut notifier = CooldownNotifier::new(LogNotifier::new(), Duration::ZERO);
        for _ in 0..3 {
            notifier.notify();
        }
        assert_eq!(notifier.suppressed(), 0);
        assert_eq!(notifier.into_inner().sent(), 3);
    }

    #[test]
    fn cooldown_suppresses_repeats() {
        let mut notifier = CooldownNotifier::new(LogNotifier::new(), Duration::from_secs(60));
        for _ in 0..4 {
            notifier.notify();
        }
        assert_eq!(notifier.suppressed(), 3);
        assert_eq!(notifier.into_inner().sent(), 1);
    }
}
