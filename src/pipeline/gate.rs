use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::cancel::CancelFlag;

/// Binary gate a worker loop parks on while its stage is disabled.
///
/// Waiting never spins: callers block on the gate's condition variable until it
/// is opened or the shared cancellation flag is raised.
pub struct Gate {
    name: &'static str,
    open: Mutex<bool>,
    changed: Condvar,
    cancel: CancelFlag,
}

impl Gate {
    /// A closed gate.
    pub fn new(name: &'static str, cancel: CancelFlag) -> Self {
        Self {
            name,
            open: Mutex::new(false),
            changed: Condvar::new(),
            cancel,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_open(&self) -> bool {
        *self.lock()
    }

    pub fn open(&self) {
        let mut open = self.lock();
        *open = true;
        self.changed.notify_all();
    }

    pub fn close(&self) {
        let mut open = self.lock();
        *open = false;
        self.changed.notify_all();
    }

    /// Block until the gate is open.
    ///
    /// Returns `false` when woken by cancellation; the caller must then leave
    /// its loop without touching shared state.
    pub fn wait_open(&self) -> bool {
        let open = self.lock();
        let _open = self
            .changed
            .wait_while(open, |open| !*open && !self.cancel.is_raised())
            .unwrap_or_else(PoisonError::into_inner);
        !self.cancel.is_raised()
    }

    /// Sleep for `duration` unless cancellation arrives first.
    ///
    /// Opening or closing the gate does not cut the sleep short. Returns
    /// `false` when cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let open = self.lock();
        let _open = self
            .changed
            .wait_timeout_while(open, duration, |_| !self.cancel.is_raised())
            .unwrap_or_else(PoisonError::into_inner);
        !self.cancel.is_raised()
    }

    /// Broadcast so sleepers and waiters re-check the cancellation flag.
    pub fn wake_all(&self) {
        let _open = self.lock();
        self.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
