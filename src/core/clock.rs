//! Time source for session deadlines and retry backoff

use tokio::time::Instant;
use trait_variant::make;

/// Injectable clock
///
/// The default [`TokioClock`] follows tokio's timer, which tests can pause and
/// advance deterministically.
#[make(Send)]
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// Resolve once `deadline` has passed
    async fn sleep_until(&self, deadline: Instant);
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleeps_until_deadline() {
        let clock = TokioClock;
        let start = clock.now();

        clock.sleep_until(start + Duration::from_secs(5)).await;

        assert!(clock.now() >= start + Duration::from_secs(5));
    }
}
