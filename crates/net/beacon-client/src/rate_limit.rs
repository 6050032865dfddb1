use std::time::Duration;

use tokio::{
    sync::Mutex,
    time::{self, Interval, MissedTickBehavior},
};

/// Fixed-cadence admission gate shared by concurrent request tasks.
///
/// Every call to [`RateLimiter::acquire`] consumes one tick, so at most
/// `rate` permits are handed out per second no matter how many tasks wait.
/// Ticks are never banked: after an idle period the limiter does not burst.
///
/// Must be created from within a Tokio runtime.
pub struct RateLimiter {
    interval: Mutex<Interval>,
}

impl RateLimiter {
    pub fn per_second(rate: u32) -> Self {
        let period = Duration::from_secs(1) / rate.max(1);
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Mutex::new(interval),
        }
    }

    /// Wait for the next permit.
    pub async fn acquire(&self) {
        self.interval.lock().await.tick().await;
    }
}
