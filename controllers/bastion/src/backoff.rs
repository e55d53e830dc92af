//! # Fibonacci Backoff
//!
//! Retry delays for bastions whose reconcile failed with a transient error.
//! The sequence is computed in minutes: 1m, 1m, 2m, 3m, 5m, 8m, 10m (max).
//!
//! In-progress operations do not go through here; they carry their own
//! requeue delay.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Returns the current delay and advances the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let result = Duration::from_secs(self.current_minutes * 60);

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = std::cmp::min(next_minutes, self.max_minutes);

        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

/// Per-object backoff state, keyed by `namespace/name`
#[derive(Debug)]
pub struct BackoffTracker {
    min_minutes: u64,
    max_minutes: u64,
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffTracker {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Next retry delay for the object, advancing its sequence
    pub fn next_backoff(&self, key: &str) -> Duration {
        match self.states.lock() {
            Ok(mut states) => states
                .entry(key.to_string())
                .or_insert_with(|| FibonacciBackoff::new(self.min_minutes, self.max_minutes))
                .next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using minimum backoff", e);
                Duration::from_secs(self.min_minutes * 60)
            }
        }
    }

    /// Forget the object's failures (on successful reconciliation or deletion)
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }
}

impl Default for BackoffTracker {
    fn default() -> Self {
        Self::new(1, 10)
    }
}
