use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Engine-wide, one-way cancellation flag.
///
/// Raising the flag alone does not wake anyone. Every wait point that observes
/// it (`Gate`, `HandoffQueue`) takes its own mutex after the flag is raised and
/// broadcasts on its condition variables; waiters re-check the flag under that
/// same mutex, so a raise can never slip between a check and a wait.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Permanent.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_raised());
        flag.raise();
        assert!(observer.is_raised());
        flag.raise();
        assert!(observer.is_raised());
    }
}
