//! Wall clock anchored to tokio's monotonic clock
//!
//! Credential expiry is an absolute instant, but countdown timers run on
//! tokio's clock. Deriving "now" from the tokio clock keeps both in step,
//! including under a paused test runtime.

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    wall_anchor: DateTime<Utc>,
    mono_anchor: Instant,
}

impl Clock {
    /// Clock anchored at the current system time
    pub fn system() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Clock reporting `wall` right now and advancing with tokio time
    pub fn anchored_at(wall: DateTime<Utc>) -> Self {
        Self {
            wall_anchor: wall,
            mono_anchor: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.mono_anchor);
        let elapsed = Duration::from_std(elapsed).unwrap_or(Duration::MAX);
        self.wall_anchor
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}
