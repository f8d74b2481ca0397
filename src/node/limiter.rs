use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// DeleteLimiter paces tiny extent deletes applied during delete record sync. One instance is
/// shared by every partition on a node. A rate of 0 means unlimited.
pub struct DeleteLimiter {
    interval_nanos: AtomicU64,
    next_slot: Mutex<Option<Instant>>,
}

impl DeleteLimiter {
    pub fn new(deletes_per_sec: u64) -> Self {
        let limiter = DeleteLimiter {
            interval_nanos: AtomicU64::new(0),
            next_slot: Mutex::new(None),
        };
        limiter.set_rate(deletes_per_sec);
        limiter
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn set_rate(&self, deletes_per_sec: u64) {
        let interval = if deletes_per_sec == 0 {
            0
        } else {
            1_000_000_000 / deletes_per_sec
        };
        self.interval_nanos.store(interval, Ordering::Release);
    }

    /// Wait for the next delete slot.
    pub async fn wait(&self) {
        let interval = self.interval_nanos.load(Ordering::Acquire);
        if interval == 0 {
            return;
        }
        let interval = Duration::from_nanos(interval);

        // Hold the lock across the sleep so waiters are served in order.
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();
        let slot = match *next_slot {
            Some(slot) if slot > now => slot,
            _ => now,
        };
        tokio::time::sleep_until(slot).await;
        next_slot.replace(slot + interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_does_not_wait() {
        let limiter = DeleteLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..1000 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn limited_rate_spaces_out_deletes() {
        let limiter = DeleteLimiter::new(100);
        let start = Instant::now();
        for _ in 0..6 {
            limiter.wait().await;
        }
        // First slot is immediate, the next five are 10ms apart.
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
