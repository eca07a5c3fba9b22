use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Single-slot, latest-value mailbox.
///
/// Posting overwrites whatever the consumer has not picked up yet, so a
/// reader always sees the newest value and never a backlog. Used between the
/// capture callback and the recognition loop, and for handing a freshly
/// built recognizer to the loop.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
    overwritten: AtomicU64,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
            overwritten: AtomicU64::new(0),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<T>> {
        // A panic in another holder cannot leave an Option half-written
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the current value and wake one waiting reader
    pub fn post(&self, value: T) {
        let previous = self.guard().replace(value);
        if previous.is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
        self.ready.notify_one();
    }

    /// Take the value without waiting
    pub fn take(&self) -> Option<T> {
        self.guard().take()
    }

    /// Take the value, waiting up to `timeout` for one to arrive
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.guard();
        loop {
            if let Some(value) = slot.take() {
                return Some(value);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            slot = match self.ready.wait_timeout(slot, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Drop any pending value
    pub fn clear(&self) {
        self.guard().take();
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_none()
    }

    /// Number of values replaced before anyone read them
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_latest_value_wins() {
        let mailbox = Mailbox::new();
        mailbox.post(1);
        mailbox.post(2);
        mailbox.post(3);
        assert_eq!(mailbox.take(), Some(3));
        assert_eq!(mailbox.take(), None);
        assert_eq!(mailbox.overwritten(), 2);
    }

    #[test]
    fn test_clear() {
        let mailbox = Mailbox::new();
        mailbox.post("echo");
        mailbox.clear();
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.take_timeout(Duration::from_millis(5)), None);
    }

    #[test]
    fn test_take_timeout_wakes_on_post() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = Arc::clone(&mailbox);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.post(42u32);
        });

        assert_eq!(mailbox.take_timeout(Duration::from_secs(5)), Some(42));
        handle.join().unwrap();
    }
}
