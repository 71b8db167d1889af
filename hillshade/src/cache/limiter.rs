//! Global admission cap on in-flight output bytes.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

const WAIT_SLICE: Duration = Duration::from_millis(500);

/// A shared ledger bounding the sum of concurrently admitted amounts.
///
/// Requests estimate their output size before rendering and block here
/// until the aggregate fits, which keeps a burst of concurrent tile
/// requests from committing more memory than the cache budget.
#[derive(Default)]
pub struct BlockingSumLimiter {
    sum: Mutex<u64>,
    released: Condvar,
}

impl BlockingSumLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `amount` against `max`, blocking while the ledger is too
    /// full. A single request larger than `max` is admitted once the
    /// ledger is empty, so an oversized render waits but never
    /// deadlocks.
    pub fn add(&self, amount: u64, max: u64) {
        let mut sum = self.sum.lock().unwrap();
        while *sum > 0 && *sum + amount > max {
            let (next, _timed_out) = self.released.wait_timeout(sum, WAIT_SLICE).unwrap();
            sum = next;
        }
        *sum += amount;
    }

    /// Release a previously admitted amount and wake waiters.
    pub fn subtract(&self, amount: u64) {
        let mut sum = self.sum.lock().unwrap();
        *sum = sum.saturating_sub(amount);
        self.released.notify_all();
    }

    /// Currently admitted total.
    pub fn current(&self) -> u64 {
        *self.sum.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_and_subtract_track_sum() {
        let limiter = BlockingSumLimiter::new();
        limiter.add(100, 1000);
        limiter.add(200, 1000);
        assert_eq!(limiter.current(), 300);
        limiter.subtract(100);
        assert_eq!(limiter.current(), 200);
        limiter.subtract(500);
        assert_eq!(limiter.current(), 0);
    }

    #[test]
    fn test_oversized_request_admitted_on_empty_ledger() {
        let limiter = BlockingSumLimiter::new();
        limiter.add(5000, 1000);
        assert_eq!(limiter.current(), 5000);
    }

    #[test]
    fn test_second_admission_waits_for_first() {
        let limiter = Arc::new(BlockingSumLimiter::new());
        // Capacity 1.5 MB, two 1 MB requests: only one fits at a time.
        let capacity = 1_500_000u64;
        let request = 1_000_000u64;

        limiter.add(request, capacity);

        let peak = Arc::new(AtomicU64::new(0));
        let second = {
            let limiter = Arc::clone(&limiter);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                limiter.add(request, capacity);
                peak.fetch_max(limiter.current(), Ordering::SeqCst);
                limiter.subtract(request);
            })
        };

        thread::sleep(Duration::from_millis(50));
        // Still blocked: ledger holds only the first request.
        assert_eq!(limiter.current(), request);

        limiter.subtract(request);
        second.join().unwrap();

        // The second admission never overlapped the first.
        assert!(peak.load(Ordering::SeqCst) <= capacity);
        assert_eq!(limiter.current(), 0);
    }

    #[test]
    fn test_concurrent_admissions_bounded() {
        let limiter = Arc::new(BlockingSumLimiter::new());
        let capacity = 300u64;
        let peak = Arc::new(AtomicU64::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..20 {
                        limiter.add(100, capacity);
                        peak.fetch_max(limiter.current(), Ordering::SeqCst);
                        limiter.subtract(100);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        // sum(in_flight) ≤ max + largest single request.
        assert!(peak.load(Ordering::SeqCst) <= capacity + 100);
        assert_eq!(limiter.current(), 0);
    }
}
