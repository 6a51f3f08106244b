//! Progress tracking utilities
//!
//! A thread-safe progress tracker for logging progress at regular intervals.
//! The tracker maintains an internal count and logs when interval boundaries
//! are crossed.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging::format_count;

/// Thread-safe progress tracker for logging progress at regular intervals.
///
/// # Example
/// ```
/// use copsort_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Completed rounds").with_interval(100);
///
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // Logs at 100, 200
/// }
/// tracker.log_final(); // Logs "Completed rounds 250 (complete)"
/// ```
pub struct ProgressTracker {
    /// The logging interval - progress is logged when count crosses multiples of this.
    interval: u64,
    /// Message prefix for log output.
    message: String,
    /// Internal count of items processed (thread-safe).
    count: AtomicU64,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified message.
    ///
    /// The tracker starts with a count of 0 and a default interval of 10,000.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 10_000, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Set the logging interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Add `amount` to the count, logging if an interval boundary was crossed.
    pub fn log_if_needed(&self, amount: u64) {
        let before = self.count.fetch_add(amount, Ordering::Relaxed);
        let after = before + amount;
        if before / self.interval != after / self.interval {
            info!("{} {}", self.message, format_count(after / self.interval * self.interval));
        }
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Log the final count regardless of interval alignment.
    pub fn log_final(&self) {
        let total = self.count();
        info!("{} {} (complete)", self.message, format_count(total));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let tracker = ProgressTracker::new("Processed").with_interval(10);
        for _ in 0..25 {
            tracker.log_if_needed(1);
        }
        assert_eq!(tracker.count(), 25);
        tracker.log_final();
    }

    #[test]
    fn test_bulk_increments() {
        let tracker = ProgressTracker::new("Processed").with_interval(100);
        tracker.log_if_needed(250);
        assert_eq!(tracker.count(), 250);
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;

        let tracker = Arc::new(ProgressTracker::new("Processed").with_interval(1000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let t = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        t.log_if_needed(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.count(), 400);
    }
}
