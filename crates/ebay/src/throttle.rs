//! Minimum spacing between outbound marketplace calls.
//!
//! The scheduler makes bursts of catalog searches and price updates;
//! this keeps consecutive calls at least a configured interval apart so
//! a large pass does not trip marketplace rate limits.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Serializes callers and enforces a minimum gap between permits.
pub struct Throttle {
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the spacing since the previous permit has elapsed.
    ///
    /// Holding the internal lock across the sleep makes concurrent
    /// callers queue up rather than all releasing at once.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_spacing {
                tokio::time::sleep(self.min_spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let throttle = Throttle::new(Duration::from_millis(200));
        let before = Instant::now();
        throttle.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquire_waits_out_the_spacing() {
        let throttle = Throttle::new(Duration::from_millis(200));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_already_elapsed_does_not_wait() {
        let throttle = Throttle::new(Duration::from_millis(200));
        throttle.acquire().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let before = Instant::now();
        throttle.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_spaced_apart() {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(200)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let throttle = throttle.clone();
            handles.push(tokio::spawn(async move {
                throttle.acquire().await;
                start.elapsed()
            }));
        }
        let mut times: Vec<Duration> = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        assert!(times[1] >= Duration::from_millis(200));
        assert!(times[2] >= Duration::from_millis(400));
    }
}
