//! Bounded single-producer / single-consumer handoff between the loops.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use super::cancel::CancelFlag;

/// Default number of frames buffered between capture and process.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// A blocking `push`/`pop` was cut short by engine shutdown.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("handoff aborted by shutdown")]
pub struct Aborted;

/// Bounded FIFO guarded by one mutex and two condition variables.
///
/// - `push` blocks while the queue holds `capacity` items.
/// - `pop` blocks while the queue is empty.
/// - Both return `Aborted` once the cancellation flag is raised, including
///   when already blocked; `wake_all` must follow the raise.
pub struct HandoffQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    cancel: CancelFlag,
}

impl<T> HandoffQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize, cancel: CancelFlag) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
            cancel,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append `item`, blocking while the queue is full.
    ///
    /// On abort the item is dropped.
    pub fn push(&self, item: T) -> Result<(), Aborted> {
        let mut items = self.lock();
        while items.len() >= self.capacity {
            if self.cancel.is_raised() {
                return Err(Aborted);
            }
            items = self
                .not_full
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if self.cancel.is_raised() {
            return Err(Aborted);
        }
        items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, blocking while the queue is empty.
    pub fn pop(&self) -> Result<T, Aborted> {
        let mut items = self.lock();
        loop {
            if self.cancel.is_raised() {
                return Err(Aborted);
            }
            if let Some(item) = items.pop_front() {
                self.not_full.notify_one();
                return Ok(item);
            }
            items = self
                .not_empty
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Discard every buffered item and wake blocked callers.
    ///
    /// Returns the number of items dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        let dropped = items.len();
        items.clear();
        self.not_full.notify_all();
        self.not_empty.notify_all();
        dropped
    }

    /// Broadcast on both conditions so waiters re-check the cancellation flag.
    pub fn wake_all(&self) {
        let _items = self.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn capacity_is_never_exceeded() {
        let cancel = CancelFlag::new();
        let queue = Arc::new(HandoffQueue::new(2, cancel));
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..50u32 {
                    queue.push(i).unwrap();
                    assert!(queue.len() <= 2);
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 50 {
            assert!(queue.len() <= 2);
            seen.push(queue.pop().unwrap());
        }
        producer.join().unwrap();

        assert_eq!(seen, (0..50).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn push_blocks_until_pop() {
        let queue = Arc::new(HandoffQueue::new(1, CancelFlag::new()));
        queue.push(1u8).unwrap();

        let (tx, rx) = mpsc::channel();
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                queue.push(2u8).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(queue.pop(), Ok(1));
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        producer.join().unwrap();
        assert_eq!(queue.pop(), Ok(2));
    }

    #[test]
    fn cancel_aborts_blocked_pop() {
        let cancel = CancelFlag::new();
        let queue: Arc<HandoffQueue<u8>> = Arc::new(HandoffQueue::new(1, cancel.clone()));
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(50));
        cancel.raise();
        queue.wake_all();
        assert_eq!(consumer.join().unwrap(), Err(Aborted));
    }

    #[test]
    fn cancel_aborts_blocked_push() {
        let cancel = CancelFlag::new();
        let queue = Arc::new(HandoffQueue::new(1, cancel.clone()));
        queue.push(0u8).unwrap();
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(1u8))
        };

        thread::sleep(Duration::from_millis(50));
        cancel.raise();
        queue.wake_all();
        assert_eq!(producer.join().unwrap(), Err(Aborted));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn clear_releases_blocked_pusher() {
        let queue = Arc::new(HandoffQueue::new(1, CancelFlag::new()));
        queue.push(10u8).unwrap();
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(11u8))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.clear(), 1);
        assert_eq!(producer.join().unwrap(), Ok(()));
        assert_eq!(queue.pop(), Ok(11));
    }

    #[test]
    fn zero_capacity_is_promoted_to_one() {
        let queue = HandoffQueue::new(0, CancelFlag::new());
        assert_eq!(queue.capacity(), 1);
        queue.push(()).unwrap();
        assert_eq!(queue.len(), 1);
    }
}
