//! Staleness check for persisted games.

use chrono::{DateTime, Duration, Utc};

/// Longest accepted window, comfortably inside chrono's range.
const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Decides whether a stored record may be served without a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    window: Duration,
}

impl FreshnessPolicy {
    pub fn new(window: Duration) -> Self {
        FreshnessPolicy { window }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_fresh(&self, updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        is_fresh(updated_at, now, self.window)
    }
}

/// A record is fresh iff it has been written and `now - updated_at <= window`.
/// Never-written records are always stale. A stamp ahead of `now` (clock
/// skew) counts as fresh.
pub fn is_fresh(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match updated_at {
        Some(stamp) => now.signed_duration_since(stamp) <= window,
        None => false,
    }
}
