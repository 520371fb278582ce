//! Exponential backoff policy used while polling for a concurrency slot.
//!
//! Expressed as an explicit struct rather than scattered sleeps, so the
//! base/multiplier/cap are configured in one place and testable in
//! isolation.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            multiplier: 1.5,
            cap: Duration::from_secs(2),
        }
    }
}

impl BackoffPolicy {
    pub fn next(&self, current: Duration) -> Duration {
        let scaled = current.mul_f64(self.multiplier);
        scaled.min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_scales_and_caps() {
        let policy = BackoffPolicy::default();
        let mut wait = policy.base;
        assert_eq!(wait, Duration::from_millis(100));
        for _ in 0..20 {
            wait = policy.next(wait);
        }
        assert_eq!(wait, Duration::from_secs(2));
    }
}
