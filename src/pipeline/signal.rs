//! Cooperative stop signal and idle backoff for drain loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Broadcast-once stop flag handed to every drain loop of a session.
///
/// Each session gets a fresh signal; clones share the flag.
#[derive(Debug, Clone, Default)]
pub(crate) struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns `true` if it was not raised before.
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bounded exponential sleep for loops that found no work.
///
/// Doubles from `min` to `max` on consecutive idle ticks and resets as soon
/// as work shows up, so a stopped loop notices the signal within `max`.
#[derive(Debug)]
pub(crate) struct IdleBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl IdleBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let min = min.max(Duration::from_micros(1));
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Returns the next sleep and advances the backoff.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub async fn wait(&mut self) {
        tokio::time::sleep(self.next_delay()).await;
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_raise_once() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_raised());
        assert!(signal.raise());
        assert!(clone.is_raised());
        assert!(!signal.raise());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = IdleBackoff::new(Duration::from_micros(250), Duration::from_millis(1));
        assert_eq!(backoff.next_delay(), Duration::from_micros(250));
        assert_eq!(backoff.next_delay(), Duration::from_micros(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_micros(250));
    }

    #[test]
    fn test_backoff_max_below_min() {
        let mut backoff = IdleBackoff::new(Duration::from_millis(2), Duration::from_millis(1));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2));
    }
}
