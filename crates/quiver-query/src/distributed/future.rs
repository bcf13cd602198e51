//! Pollable task handles.
//!
//! The pull chain is single-threaded and must never block on one remote
//! record: work that may wait on another worker is spawned onto a task
//! whose [`TaskHandle`] the cursor polls at convenient points. Handles
//! are also how the RPC client pools expose in-flight requests.

use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

enum Slot<T> {
    Pending,
    Ready(T),
    Taken,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// A handle to a value being produced on another thread.
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> TaskHandle<T> {
    /// Creates an already-completed handle.
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self { shared: Arc::new(Shared { slot: Mutex::new(Slot::Ready(value)), ready: Condvar::new() }) }
    }

    /// Returns true once the value is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(&*self.shared.slot.lock(), Slot::Ready(_))
    }

    /// Takes the value if it is available. After a successful take the
    /// handle is spent.
    pub fn try_take(&mut self) -> Option<T> {
        let mut slot = self.shared.slot.lock();
        match &*slot {
            Slot::Ready(_) => match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Ready(value) => Some(value),
                _ => None,
            },
            _ => None,
        }
    }

    /// Blocks until the value is available and takes it.
    ///
    /// # Panics
    ///
    /// Panics if the value was already taken, or if the producing thread
    /// died without completing.
    #[must_use]
    pub fn wait(self) -> T {
        let mut slot = self.shared.slot.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Pending) {
                Slot::Ready(value) => return value,
                Slot::Taken => panic!("task result was already taken"),
                Slot::Pending => {
                    if Arc::strong_count(&self.shared) == 1 {
                        panic!("task ended without producing a result");
                    }
                    self.shared.ready.wait(&mut slot);
                }
            }
        }
    }
}

/// Runs the closure on a new thread, returning a handle to its result.
pub fn spawn<T, F>(task: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let shared = Arc::new(Shared { slot: Mutex::new(Slot::Pending), ready: Condvar::new() });
    let producer = Arc::clone(&shared);
    thread::spawn(move || {
        let value = task();
        *producer.slot.lock() = Slot::Ready(value);
        producer.ready.notify_all();
    });
    TaskHandle { shared }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ready_handle_is_immediately_available() {
        let mut handle = TaskHandle::ready(7);
        assert!(handle.is_ready());
        assert_eq!(handle.try_take(), Some(7));
        assert_eq!(handle.try_take(), None);
    }

    #[test]
    fn spawned_task_completes() {
        let handle = spawn(|| {
            thread::sleep(Duration::from_millis(5));
            42
        });
        assert_eq!(handle.wait(), 42);
    }

    #[test]
    fn try_take_polls_without_blocking() {
        let mut handle = spawn(|| {
            thread::sleep(Duration::from_millis(20));
            1
        });
        // Poll until the task finishes.
        loop {
            if let Some(value) = handle.try_take() {
                assert_eq!(value, 1);
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}
