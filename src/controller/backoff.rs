//! # Fibonacci Backoff
//!
//! Progressive delay between transient retries. Grows more slowly than
//! exponential backoff, so a short platform hiccup is retried quickly while
//! a longer outage is not hammered.
//!
//! Sequence for a 250ms start and a 5s cap: 250ms, 250ms, 500ms, 750ms,
//! 1250ms, 2000ms, 3250ms, 5000ms (max).
//!
//! ## Usage
//!
//! ```rust
//! use extension_controller::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(250, 5000);
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(250));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(250));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(500));
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at the maximum.
/// Values are kept in milliseconds.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_ms: u64,
    prev_ms: u64,
    current_ms: u64,
    max_ms: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_ms` and capped at `max_ms`
    #[must_use]
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            prev_ms: 0,
            current_ms: min_ms.min(max_ms),
            max_ms,
        }
    }

    /// Get the next delay in milliseconds and advance the sequence
    pub fn next_backoff_ms(&mut self) -> u64 {
        let result = self.current_ms;

        let next = self.prev_ms.saturating_add(self.current_ms);
        self.prev_ms = self.current_ms;
        self.current_ms = next.min(self.max_ms);

        result
    }

    /// Get the next delay as a `Duration` and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_millis(self.next_backoff_ms())
    }

    /// Restart the sequence after a success
    pub fn reset(&mut self) {
        self.prev_ms = 0;
        self.current_ms = self.min_ms.min(self.max_ms);
    }
}
