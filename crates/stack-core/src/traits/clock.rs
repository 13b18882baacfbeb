//! Time source trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Current time and sleeping.
///
/// Token freshness is judged against [`Clock::now`], and every delay between
/// request attempts goes through [`Clock::sleep`].
#[async_trait]
pub trait Clock: Send + Sync {
    /// The current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// The system clock, sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
