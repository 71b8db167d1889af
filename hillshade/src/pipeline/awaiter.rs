//! Cooperative wait/notify used to pace raster readers.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Upper bound on a single wait slice. Waits are timed so a lost notify
/// only delays a waiter by one slice instead of hanging it.
const WAIT_SLICE: Duration = Duration::from_millis(500);

/// Predicate-driven wait/notify pair.
///
/// A reader blocks in [`Awaiter::do_wait`] until its predicate passes;
/// each completing compute task calls [`Awaiter::do_notify`].
#[derive(Default)]
pub struct Awaiter {
    guard: Mutex<()>,
    condition: Condvar,
}

impl Awaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `predicate` returns `true`.
    ///
    /// The predicate is evaluated under the awaiter's lock, so a notifier
    /// that changes state and then calls [`Awaiter::do_notify`] cannot be
    /// missed between the check and the wait.
    pub fn do_wait(&self, predicate: impl Fn() -> bool) {
        let mut guard = self.guard.lock().unwrap();
        while !predicate() {
            let (next, _timed_out) = self.condition.wait_timeout(guard, WAIT_SLICE).unwrap();
            guard = next;
        }
    }

    /// Wake all current waiters so they re-evaluate their predicates.
    pub fn do_notify(&self) {
        let _guard = self.guard.lock().unwrap();
        self.condition.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_returns_immediately_when_predicate_holds() {
        let awaiter = Awaiter::new();
        let start = Instant::now();
        awaiter.do_wait(|| true);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_notify_releases_waiter() {
        let awaiter = Arc::new(Awaiter::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let awaiter = Arc::clone(&awaiter);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                awaiter.do_wait(|| flag.load(Ordering::SeqCst));
            })
        };

        thread::sleep(Duration::from_millis(30));
        flag.store(true, Ordering::SeqCst);
        awaiter.do_notify();

        waiter.join().unwrap();
    }

    #[test]
    fn test_waiter_survives_lost_notification() {
        // The flag flips without any notify; the timed wait must still
        // observe it within one slice.
        let awaiter = Arc::new(Awaiter::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let awaiter = Arc::clone(&awaiter);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                awaiter.do_wait(|| flag.load(Ordering::SeqCst));
            })
        };

        thread::sleep(Duration::from_millis(30));
        flag.store(true, Ordering::SeqCst);

        waiter.join().unwrap();
    }
}
