//! Deadline-bound polling support for the download wait loop.
//!
//! A [`Deadline`] is a value object: it records when the wait started and how
//! long it may last, and never changes after construction. Sleeping through a
//! deadline is clamped to the remaining budget so a polling loop stops at
//! expiry instead of overshooting by a full interval.
//!
//! The deadline reads the Tokio clock, so tests can pause and advance time.

use std::time::Duration;

use tokio::time::Instant;

/// Lower bound for the polling interval, avoids busy-spinning on the session state.
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_millis(100);

/// Wall-clock budget for a single wait phase.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    /// Starts a new deadline of `timeout` from now.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    /// The total budget this deadline was created with.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time spent since the deadline started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns `true` once the full timeout has passed.
    #[must_use]
    pub fn has_elapsed(&self) -> bool {
        self.elapsed() >= self.timeout
    }

    /// Remaining budget, zero once elapsed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }

    /// Sleeps for `interval`, but never past the deadline.
    pub async fn sleep(&self, interval: Duration) {
        let pause = interval.min(self.remaining());
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

/// Applies the [`MIN_POLLING_INTERVAL`] floor to a configured interval.
#[must_use]
pub fn effective_polling_interval(configured: Duration) -> Duration {
    configured.max(MIN_POLLING_INTERVAL)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_has_elapsed_is_stable_until_time_advances() {
        let deadline = Deadline::new(Duration::from_millis(300));

        for _ in 0..5 {
            assert!(!deadline.has_elapsed());
        }

        tokio::time::advance(Duration::from_millis(299)).await;
        assert!(!deadline.has_elapsed());

        tokio::time::advance(Duration::from_millis(1)).await;
        for _ in 0..5 {
            assert!(deadline.has_elapsed());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_clamped_to_remaining_time() {
        let deadline = Deadline::new(Duration::from_millis(250));
        let start = Instant::now();

        deadline.sleep(Duration::from_millis(200)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));

        // Only 50ms are left; a full 200ms interval must not overshoot.
        deadline.sleep(Duration::from_millis(200)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
        assert!(deadline.has_elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_after_expiry_returns_immediately() {
        let deadline = Deadline::new(Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(50)).await;

        let start = Instant::now();
        deadline.sleep(Duration::from_secs(5)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_zero_timeout_is_elapsed_immediately() {
        tokio_test::block_on(async {
            let deadline = Deadline::new(Duration::ZERO);
            assert!(deadline.has_elapsed());
            deadline.sleep(Duration::from_secs(1)).await;
        });
    }

    #[test]
    fn test_polling_interval_has_a_floor() {
        assert_eq!(
            effective_polling_interval(Duration::from_millis(5)),
            MIN_POLLING_INTERVAL
        );
        assert_eq!(
            effective_polling_interval(Duration::from_millis(250)),
            Duration::from_millis(250)
        );
    }
}
